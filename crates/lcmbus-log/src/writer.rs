use std::io::Write;

use bytes::BytesMut;

use lcmbus_wire::LogEvent;

use crate::error::Result;

/// Writes marshalled log events to any `Write` sink.
pub struct LogWriter<W> {
    inner: W,
    scratch: BytesMut,
}

impl<W: Write> LogWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: BytesMut::new(),
        }
    }

    /// Marshal and write one event, returning the bytes written.
    pub fn write_event(&mut self, event: &LogEvent) -> Result<usize> {
        self.scratch.clear();
        let len = event.encode(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(len)
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;

    use super::*;
    use crate::scanner::LogScanner;

    #[test]
    fn written_events_scan_back() {
        let events = vec![
            LogEvent {
                event_number: 1,
                timestamp_us: 300_010_000,
                channel: "test".to_string(),
                params: String::new(),
                data: Bytes::from_static(b"test_data"),
            },
            LogEvent {
                event_number: 8,
                timestamp_us: 300_010_000,
                channel: "testt".to_string(),
                params: String::new(),
                data: Bytes::from_static(b"test_data2"),
            },
        ];
        let mut writer = LogWriter::new(Cursor::new(Vec::new()));
        for event in &events {
            let n = writer.write_event(event).unwrap();
            assert_eq!(n, event.encoded_len());
        }
        let wire = writer.into_inner().into_inner();
        let mut scanner = LogScanner::new(Cursor::new(wire));
        for expected in &events {
            assert!(scanner.scan());
            assert_eq!(scanner.event(), expected);
        }
        assert!(!scanner.scan());
        assert!(scanner.err().is_none());
    }
}
