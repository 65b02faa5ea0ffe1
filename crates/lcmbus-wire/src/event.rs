use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::message::split_raw_channel;

/// The sync word prefixing every log event.
pub const SYNC_WORD: u32 = 0xEDA1_DA01;

/// Fixed log-event header size.
pub const EVENT_HEADER_SIZE: usize = 28;

/// One event in the ordered list of events in an LCM log file.
///
/// ```text
///  0      7 8     15 16    23 24    31
///  +--------+--------+--------+--------+
///  |   LCM Sync Word                   |
///  +--------+--------+--------+--------+
///  |   Event Number (u64 BE)           |
///  +--------+--------+--------+--------+
///  |   Timestamp (u64 BE, µs since     |
///  |   epoch)                          |
///  +--------+--------+--------+--------+
///  |   Channel Length                  |
///  +--------+--------+--------+--------+
///  |   Data Length                     |
///  +--------+--------+--------+--------+
/// ```
///
/// The header is followed by the UTF-8 channel (NOT NUL-terminated, may
/// carry `?params`), then the data. All integers big-endian.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEvent {
    /// Monotonic from 0, +1 per event.
    pub event_number: u64,
    /// Microseconds since 00:00:00 UTC, January 1 1970.
    pub timestamp_us: u64,
    pub channel: String,
    pub params: String,
    pub data: Bytes,
}

impl LogEvent {
    /// Length of the channel as written to the log (`channel` or
    /// `channel?params`).
    pub fn raw_channel_len(&self) -> usize {
        if self.params.is_empty() {
            self.channel.len()
        } else {
            self.channel.len() + 1 + self.params.len()
        }
    }

    /// The total encoded size of this event.
    pub fn encoded_len(&self) -> usize {
        EVENT_HEADER_SIZE + self.raw_channel_len() + self.data.len()
    }

    /// Encode into `dst`, returning the number of bytes written.
    pub fn encode(&self, dst: &mut BytesMut) -> usize {
        dst.reserve(self.encoded_len());
        dst.put_u32(SYNC_WORD);
        dst.put_u64(self.event_number);
        dst.put_u64(self.timestamp_us);
        dst.put_u32(self.raw_channel_len() as u32);
        dst.put_u32(self.data.len() as u32);
        dst.put_slice(self.channel.as_bytes());
        if !self.params.is_empty() {
            dst.put_u8(b'?');
            dst.put_slice(self.params.as_bytes());
        }
        dst.put_slice(&self.data);
        self.encoded_len()
    }

    /// Decode one complete event record, as delimited by [`scan`].
    pub fn decode(record: &[u8]) -> Result<Self> {
        if record.len() < EVENT_HEADER_SIZE {
            return Err(WireError::TooShort { len: record.len() });
        }
        let sync = u32::from_be_bytes(record[0..4].try_into().unwrap());
        if sync != SYNC_WORD {
            return Err(WireError::UnexpectedSyncWord { found: sync });
        }
        let event_number = u64::from_be_bytes(record[4..12].try_into().unwrap());
        let timestamp_us = u64::from_be_bytes(record[12..20].try_into().unwrap());
        let channel_len = u32::from_be_bytes(record[20..24].try_into().unwrap()) as usize;
        let data_len = u32::from_be_bytes(record[24..28].try_into().unwrap()) as usize;
        if record.len() < EVENT_HEADER_SIZE + channel_len + data_len {
            return Err(WireError::PartialMessage { len: record.len() });
        }
        let end_of_channel = EVENT_HEADER_SIZE + channel_len;
        let (channel, params) = split_raw_channel(&record[EVENT_HEADER_SIZE..end_of_channel]);
        let data = Bytes::copy_from_slice(&record[end_of_channel..end_of_channel + data_len]);
        Ok(Self {
            event_number,
            timestamp_us,
            channel,
            params,
            data,
        })
    }
}

/// Delimit the next complete event in `buf`.
///
/// Returns `Ok(Some((advance, record)))` when a full event is buffered,
/// `Ok(None)` when more input is needed, and an error when the buffer
/// cannot begin a valid event (`UnexpectedSyncWord`) or ends mid-event at
/// EOF (`PartialMessage`).
pub fn scan(buf: &[u8], at_eof: bool) -> Result<Option<(usize, &[u8])>> {
    if buf.is_empty() {
        return Ok(None);
    }
    if buf.len() < EVENT_HEADER_SIZE {
        if at_eof {
            return Err(WireError::PartialMessage { len: buf.len() });
        }
        return Ok(None);
    }
    let sync = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    if sync != SYNC_WORD {
        return Err(WireError::UnexpectedSyncWord { found: sync });
    }
    let channel_len = u32::from_be_bytes(buf[20..24].try_into().unwrap()) as usize;
    let data_len = u32::from_be_bytes(buf[24..28].try_into().unwrap()) as usize;
    let record_len = EVENT_HEADER_SIZE + channel_len + data_len;
    if buf.len() < record_len {
        if at_eof {
            return Err(WireError::PartialMessage { len: buf.len() });
        }
        return Ok(None);
    }
    Ok(Some((record_len, &buf[..record_len])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> LogEvent {
        LogEvent {
            event_number: 1,
            timestamp_us: 300_010_000,
            channel: "test".to_string(),
            params: String::new(),
            data: Bytes::from_static(b"test_data"),
        }
    }

    #[test]
    fn roundtrip() {
        let event = sample_event();
        let mut dst = BytesMut::new();
        let n = event.encode(&mut dst);
        assert_eq!(n, dst.len());
        assert_eq!(LogEvent::decode(&dst).unwrap(), event);
    }

    #[test]
    fn roundtrip_with_params() {
        let event = LogEvent {
            params: "z=lz4".to_string(),
            ..sample_event()
        };
        let mut dst = BytesMut::new();
        event.encode(&mut dst);
        // Channel length on disk covers "channel?params".
        assert_eq!(&dst[20..24], &9u32.to_be_bytes());
        assert_eq!(LogEvent::decode(&dst).unwrap(), event);
    }

    #[test]
    fn header_layout() {
        let mut dst = BytesMut::new();
        sample_event().encode(&mut dst);
        assert_eq!(&dst[0..4], &[0xED, 0xA1, 0xDA, 0x01]);
        assert_eq!(&dst[4..12], &1u64.to_be_bytes());
        assert_eq!(&dst[12..20], &300_010_000u64.to_be_bytes());
        assert_eq!(&dst[20..24], &4u32.to_be_bytes());
        assert_eq!(&dst[24..28], &9u32.to_be_bytes());
        assert_eq!(&dst[28..32], b"test");
        assert_eq!(&dst[32..], b"test_data");
    }

    #[test]
    fn scan_complete_event() {
        let mut dst = BytesMut::new();
        sample_event().encode(&mut dst);
        dst.extend_from_slice(&[0xED]); // start of the next event
        let (advance, record) = scan(&dst, false).unwrap().unwrap();
        assert_eq!(advance, sample_event().encoded_len());
        assert_eq!(LogEvent::decode(record).unwrap(), sample_event());
    }

    #[test]
    fn scan_needs_more_input() {
        let mut dst = BytesMut::new();
        sample_event().encode(&mut dst);
        assert!(scan(&dst[..10], false).unwrap().is_none());
        assert!(scan(&dst[..30], false).unwrap().is_none());
        assert!(scan(&[], true).unwrap().is_none());
    }

    #[test]
    fn scan_partial_at_eof() {
        let mut dst = BytesMut::new();
        sample_event().encode(&mut dst);
        let err = scan(&dst[..10], true).unwrap_err();
        assert!(matches!(err, WireError::PartialMessage { len: 10 }));
        let err = scan(&dst[..30], true).unwrap_err();
        assert!(matches!(err, WireError::PartialMessage { len: 30 }));
    }

    #[test]
    fn scan_unexpected_sync_word() {
        let buf = [0u8; EVENT_HEADER_SIZE];
        let err = scan(&buf, false).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedSyncWord { found: 0 }));
    }
}
