//! Reading, writing, splitting and replaying LCM log files.
//!
//! A log file is a plain concatenation of events (see `lcmbus-wire`). The
//! [`LogScanner`] delimits and decodes them from any `Read` stream,
//! decompressing payloads whose params name a known codec; the
//! [`LogWriter`] appends events to any sink; the [`SplitWriter`] rotates
//! output across `<base>.<k>` files at a size threshold; and the
//! [`Player`] paces a recorded log back onto the bus through a
//! [`Transmit`] capability.

pub mod error;
pub mod player;
pub mod scanner;
pub mod split;
pub mod writer;

pub use error::{LogError, Result};
pub use player::{Player, Transmit};
pub use scanner::LogScanner;
pub use split::{split_log, SplitWriter};
pub use writer::LogWriter;
