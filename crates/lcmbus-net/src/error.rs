use std::net::Ipv4Addr;

/// Errors that can occur in receiver and transmitter operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Wire-level encode/decode error.
    #[error("wire error: {0}")]
    Wire(#[from] lcmbus_wire::WireError),

    /// Filter compilation or assembly error.
    #[error("filter error: {0}")]
    Filter(#[from] lcmbus_filter::FilterError),

    /// Per-channel compression failed.
    #[error(transparent)]
    Compress(#[from] lcmbus_compress::CompressError),

    /// Payload decompression failed.
    #[error(transparent)]
    Decompress(#[from] lcmbus_compress::DecompressError),

    /// A typed payload did not decode as the registered message.
    #[error("typed decode on channel {channel}: {source}")]
    TypedDecode {
        channel: String,
        #[source]
        source: prost::DecodeError,
    },

    /// The wire parameter carried more than one `key=value` fragment.
    #[error("multiple query params not supported: {params:?}")]
    MultipleParams { params: String },

    /// A receive group address outside the multicast range.
    #[error("{addr} is not a multicast address")]
    MulticastAddressRequired { addr: Ipv4Addr },

    /// The named interface does not exist.
    #[error("interface {name}: not found")]
    InterfaceNotFound { name: String },

    /// The named interface is administratively down.
    #[error("interface {name}: not up")]
    InterfaceNotUp { name: String },

    /// The named interface cannot do multicast.
    #[error("interface {name}: not a multicast interface")]
    InterfaceNotMulticast { name: String },

    /// The interface has no IPv4 address to transmit from.
    #[error("interface {name}: no IPv4 address")]
    InterfaceHasNoAddress { name: String },

    /// No interface on the host is suitable for multicast transmit.
    #[error("no multicast-capable interface available")]
    NoMulticastInterface,

    /// The caller's token was tripped or its deadline elapsed.
    #[error("operation cancelled")]
    Cancelled,

    /// An underlying system call failed.
    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    /// Fold a blocked-past-deadline system call into the caller's
    /// cancellation error.
    pub(crate) fn from_socket(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => NetError::Cancelled,
            _ => NetError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetError>;
