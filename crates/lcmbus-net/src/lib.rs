//! UDP multicast transport for LCM messages.
//!
//! A [`Transmitter`] assigns monotonic sequence numbers, optionally
//! compresses per-channel payloads and fans a marshalled datagram out to
//! one or more destination addresses. A [`Receiver`] joins one or more
//! multicast groups on a chosen interface, pulls datagrams in batches,
//! filters uninteresting channels in the kernel (Linux), decodes and
//! optionally decompresses each message, and can demultiplex typed
//! (protobuf) payloads through a [`TypedRegistry`].
//!
//! Both objects are single-owner: one task constructs, operates and closes
//! each instance. Blocking calls take a [`CancelToken`] whose deadline is
//! propagated to the socket.

use std::net::Ipv4Addr;

mod batch;
pub mod error;
pub mod iface;
pub mod receiver;
mod socket;
pub mod token;
pub mod transmitter;
pub mod typed;

pub use error::{NetError, Result};
pub use iface::Interface;
pub use receiver::{Receiver, ReceiverOptions};
pub use token::CancelToken;
pub use transmitter::{Transmitter, TransmitterOptions};
pub use typed::{typed_message_filter, TypedRegistry};

/// The default LCM port.
pub const DEFAULT_PORT: u16 = 7667;

/// The default LCM multicast group.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 76, 67);
