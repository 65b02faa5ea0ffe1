//! Payload compression capabilities.
//!
//! A channel opts into compression by carrying a `z=<name>` query
//! parameter on the wire; the transmit side compresses with a registered
//! [`Compressor`] and the receive side looks the parameter up in a map of
//! [`Decompressor`]s. LZ4 (frame format) is the conventional choice.

use std::io::{Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

/// Errors from a [`Compressor`].
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    /// The underlying codec failed.
    #[error("compression failure: {0}")]
    Failure(#[from] std::io::Error),
}

/// Errors from a [`Decompressor`].
#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    /// The underlying codec failed (corrupt or truncated input).
    #[error("decompression failure: {0}")]
    Failure(#[from] std::io::Error),
}

/// Compresses payloads on the transmit side.
pub trait Compressor {
    /// The name carried on the wire as `z=<name>`.
    fn name(&self) -> &str;

    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError>;
}

/// Decompresses payloads on the receive side.
pub trait Decompressor {
    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, DecompressError>;
}

/// The wire name of the LZ4 codec.
pub const LZ4: &str = "lz4";

/// LZ4 frame-format compressor.
#[derive(Debug, Default)]
pub struct Lz4Compressor;

impl Lz4Compressor {
    pub fn new() -> Self {
        Self
    }
}

impl Compressor for Lz4Compressor {
    fn name(&self) -> &str {
        LZ4
    }

    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        let mut encoder = FrameEncoder::new(Vec::with_capacity(data.len() / 2));
        encoder.write_all(data)?;
        let out = encoder.finish().map_err(std::io::Error::other)?;
        Ok(out)
    }
}

/// LZ4 frame-format decompressor.
#[derive(Debug, Default)]
pub struct Lz4Decompressor;

impl Lz4Decompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Decompressor for Lz4Decompressor {
    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, DecompressError> {
        let mut out = Vec::with_capacity(data.len() * 2);
        FrameDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}
