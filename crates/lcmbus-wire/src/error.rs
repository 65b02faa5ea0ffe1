use crate::message::MAX_CHANNEL_LEN;

/// Errors that can occur during wire encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The channel (including `?params`) exceeds the wire limit.
    #[error("channel too long ({len} bytes, max {MAX_CHANNEL_LEN})")]
    ChannelTooLong { len: usize },

    /// Channel, separator and data together exceed the datagram limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The input is shorter than the smallest possible message.
    #[error("datagram too short ({len} bytes)")]
    TooShort { len: usize },

    /// The first four bytes are not a known header magic.
    #[error("wrong header magic: {found:#010x}")]
    BadMagic { found: u32 },

    /// No NUL terminator was found after the channel name.
    #[error("channel name is not NUL-terminated")]
    UnterminatedChannel,

    /// A log record does not start with the event sync word.
    #[error("unexpected sync word: {found:#010x}")]
    UnexpectedSyncWord { found: u32 },

    /// End of input was reached in the middle of a log event.
    #[error("partial event at end of log ({len} trailing bytes)")]
    PartialMessage { len: usize },

    /// An I/O error occurred while reading or writing.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WireError>;
