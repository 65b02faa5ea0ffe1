use std::collections::HashMap;
use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};

use lcmbus_compress::{Decompressor, Lz4Decompressor};
use lcmbus_wire::{event, LogEvent};

use crate::error::LogError;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete log events from any `Read` stream.
///
/// Handles partial reads internally — callers always see whole events.
/// Events whose params name a known decompressor are decompressed before
/// they are exposed.
pub struct LogScanner<R> {
    inner: R,
    buf: BytesMut,
    at_eof: bool,
    event: LogEvent,
    raw: Vec<u8>,
    error: Option<LogError>,
    decompressors: HashMap<String, Box<dyn Decompressor>>,
}

impl<R: Read> LogScanner<R> {
    pub fn new(inner: R) -> Self {
        let mut decompressors: HashMap<String, Box<dyn Decompressor>> = HashMap::new();
        decompressors.insert("z=lz4".to_string(), Box::new(Lz4Decompressor::new()));
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            at_eof: false,
            event: LogEvent::default(),
            raw: Vec::new(),
            error: None,
            decompressors,
        }
    }

    /// Register a decompressor for events carrying `z=<name>`.
    pub fn with_decompressor(
        mut self,
        name: impl AsRef<str>,
        decompressor: Box<dyn Decompressor>,
    ) -> Self {
        self.decompressors
            .insert(format!("z={}", name.as_ref()), decompressor);
        self
    }

    /// Advance to the next event.
    ///
    /// Returns `false` at clean end of input or on error; check
    /// [`LogScanner::err`] to tell the two apart.
    pub fn scan(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        loop {
            let scanned = event::scan(&self.buf, self.at_eof).map(|found| found.map(|(n, _)| n));
            match scanned {
                Ok(Some(record_len)) => {
                    let record = &self.buf[..record_len];
                    match LogEvent::decode(record) {
                        Ok(decoded) => self.event = decoded,
                        Err(err) => {
                            self.error = Some(err.into());
                            return false;
                        }
                    }
                    self.raw.clear();
                    self.raw.extend_from_slice(record);
                    self.buf.advance(record_len);
                    return self.decompress_current();
                }
                Ok(None) => {
                    if self.at_eof {
                        return false;
                    }
                    if !self.fill() {
                        return false;
                    }
                }
                Err(err) => {
                    self.error = Some(err.into());
                    return false;
                }
            }
        }
    }

    fn fill(&mut self) -> bool {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    self.at_eof = true;
                    return true;
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return true;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.error = Some(err.into());
                    return false;
                }
            }
        }
    }

    fn decompress_current(&mut self) -> bool {
        if self.event.params.is_empty() {
            return true;
        }
        // Only the fragment before any `&` selects a decompressor.
        let key = self.event.params.split('&').next().unwrap_or("");
        if let Some(decompressor) = self.decompressors.get_mut(key) {
            match decompressor.decompress(&self.event.data) {
                Ok(data) => self.event.data = data.into(),
                Err(err) => {
                    self.error = Some(err.into());
                    return false;
                }
            }
        }
        true
    }

    /// The last scanned event.
    pub fn event(&self) -> &LogEvent {
        &self.event
    }

    /// The raw bytes of the last scanned event, as stored in the log
    /// (compressed payload included).
    pub fn raw_event(&self) -> &[u8] {
        &self.raw
    }

    /// The error that stopped the scan, if any.
    pub fn err(&self) -> Option<&LogError> {
        self.error.as_ref()
    }

    /// Take ownership of the stored error.
    pub fn take_err(&mut self) -> Option<LogError> {
        self.error.take()
    }
}
