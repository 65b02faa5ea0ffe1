use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::scanner::LogScanner;

/// Writes whole log records across a series of size-bounded files.
///
/// The `k`-th output file is named `<base>.<k>` starting at `k = 0`. A new
/// file is started once the cumulative bytes in the current one reach the
/// megabyte threshold; a record is never split across files. A threshold
/// of zero disables rotation.
pub struct SplitWriter {
    base: PathBuf,
    limit_bytes: u64,
    file: Option<File>,
    index: u32,
    written: u64,
}

impl SplitWriter {
    pub fn new(base: impl Into<PathBuf>, limit_mb: u32) -> Self {
        Self {
            base: base.into(),
            limit_bytes: u64::from(limit_mb) * 1_000_000,
            file: None,
            index: 0,
            written: 0,
        }
    }

    /// Append one whole record, rotating beforehand if the current file
    /// is full.
    pub fn write_record(&mut self, record: &[u8]) -> Result<()> {
        if self.limit_bytes > 0 && self.written >= self.limit_bytes && self.file.is_some() {
            self.file = None;
            self.written = 0;
        }
        if self.file.is_none() {
            let path = PathBuf::from(format!("{}.{}", self.base.display(), self.index));
            debug!(path = %path.display(), "starting log segment");
            self.file = Some(File::create(path)?);
            self.index += 1;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(record)?;
            self.written += record.len() as u64;
        }
        Ok(())
    }

    /// Close the current file, if any.
    pub fn finish(mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Number of files started so far.
    pub fn files_written(&self) -> u32 {
        self.index
    }
}

/// Drain `scanner` into rotated `<base>.<k>` files, returning how many
/// files were written.
pub fn split_log<R: Read>(
    scanner: &mut LogScanner<R>,
    base: impl Into<PathBuf>,
    limit_mb: u32,
) -> Result<u32> {
    let mut writer = SplitWriter::new(base, limit_mb);
    while scanner.scan() {
        writer.write_record(scanner.raw_event())?;
    }
    if let Some(err) = scanner.take_err() {
        return Err(err);
    }
    let files = writer.files_written();
    writer.finish()?;
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{Bytes, BytesMut};
    use lcmbus_wire::LogEvent;

    use super::*;

    fn temp_base(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lcmbus-split-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("events.log")
    }

    fn sample_log(count: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for i in 0..count {
            LogEvent {
                event_number: i,
                timestamp_us: i * 1_000_000,
                channel: "split".to_string(),
                params: String::new(),
                data: Bytes::from(vec![0xCD; 64]),
            }
            .encode(&mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn single_file_when_under_limit() {
        let base = temp_base("single");
        let log = sample_log(4);
        let mut scanner = LogScanner::new(Cursor::new(log.clone()));
        let files = split_log(&mut scanner, &base, 1000).unwrap();
        assert_eq!(files, 1);
        let first = std::fs::read(format!("{}.0", base.display())).unwrap();
        assert_eq!(first, log);
        let _ = std::fs::remove_dir_all(base.parent().unwrap());
    }

    #[test]
    fn rotation_never_splits_an_event() {
        let base = temp_base("rotate");
        let log = sample_log(10);
        let mut scanner = LogScanner::new(Cursor::new(log.clone()));

        // Force rotation after every record: the threshold is far below
        // one encoded event.
        let mut writer = SplitWriter::new(&base, 0);
        writer.limit_bytes = 1;
        while scanner.scan() {
            writer.write_record(scanner.raw_event()).unwrap();
        }
        assert!(scanner.take_err().is_none());
        let files = writer.files_written();
        writer.finish().unwrap();
        assert_eq!(files, 10);

        // Every file holds exactly one complete event; concatenating them
        // reproduces the input.
        let mut joined = Vec::new();
        for k in 0..files {
            let chunk = std::fs::read(format!("{}.{k}", base.display())).unwrap();
            let mut piece = LogScanner::new(Cursor::new(chunk.clone()));
            assert!(piece.scan());
            assert!(!piece.scan());
            assert!(piece.err().is_none());
            joined.extend_from_slice(&chunk);
        }
        assert_eq!(joined, log);
        let _ = std::fs::remove_dir_all(base.parent().unwrap());
    }
}
