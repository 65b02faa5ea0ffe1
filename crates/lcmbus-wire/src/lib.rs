//! Bit-exact codecs for the LCM wire protocols and log-file format.
//!
//! Three encodings live here:
//! - Short messages (`LC02`): one datagram per message, NUL-terminated
//!   channel, optional `?key=value` parameter.
//! - Fragment headers (`LC03`): marshalling for long-message fragments.
//! - Log events: the 28-byte-header records that make up an LCM log file,
//!   plus the scan function that delimits them in a byte stream.
//!
//! All multi-byte integers are big-endian on the wire and on disk.

pub mod error;
pub mod event;
pub mod fragment;
pub mod message;

pub use error::{Result, WireError};
pub use event::{scan, LogEvent, EVENT_HEADER_SIZE, SYNC_WORD};
pub use fragment::{FragmentMessage, ETHERNET_MTU, FRAGMENT_MESSAGE_MAGIC};
pub use message::{
    encode_message, ShortMessage, HEADER_SIZE, MAX_CHANNEL_LEN, MAX_DATAGRAM_LEN, MAX_PAYLOAD_LEN,
    SHORT_MESSAGE_MAGIC,
};
