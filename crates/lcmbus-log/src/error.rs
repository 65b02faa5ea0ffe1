/// Errors that can occur while scanning, writing or playing logs.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A malformed record (bad sync word, truncated event, ...).
    #[error("log format error: {0}")]
    Wire(#[from] lcmbus_wire::WireError),

    /// Payload decompression failed.
    #[error(transparent)]
    Decompress(#[from] lcmbus_compress::DecompressError),

    /// Playback transmit failed or was cancelled.
    #[error(transparent)]
    Net(#[from] lcmbus_net::NetError),

    /// An underlying read or write failed.
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;
