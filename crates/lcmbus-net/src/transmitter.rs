use std::collections::HashMap;
use std::io;
use std::net::SocketAddrV4;

use bytes::BytesMut;
use socket2::Socket;
use tracing::debug;

use lcmbus_compress::Compressor;
use lcmbus_wire::{encode_message, MAX_DATAGRAM_LEN};

use crate::batch;
use crate::error::{NetError, Result};
use crate::iface;
use crate::socket;
use crate::token::CancelToken;
use crate::{DEFAULT_MULTICAST_GROUP, DEFAULT_PORT};

/// Configuration for a [`Transmitter`], frozen at construction.
pub struct TransmitterOptions {
    interface: Option<String>,
    addresses: Vec<SocketAddrV4>,
    ttl: u32,
    loopback: bool,
    compressors: HashMap<String, Box<dyn Compressor>>,
}

impl Default for TransmitterOptions {
    fn default() -> Self {
        Self {
            interface: None,
            addresses: Vec::new(),
            ttl: 1,
            loopback: true,
            compressors: HashMap::new(),
        }
    }
}

impl TransmitterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transmit on a named interface instead of the default multicast
    /// route.
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    /// Add a destination address. Repeat to fan out to several;
    /// destinations may be unicast.
    pub fn with_address(mut self, address: SocketAddrV4) -> Self {
        self.addresses.push(address);
        self
    }

    /// Multicast TTL (hop limit).
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether transmitted datagrams loop back to local receivers.
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Compress payloads on `channel` with `compressor`; receivers see
    /// `z=<name>` on the wire.
    pub fn with_compression(
        mut self,
        channel: impl Into<String>,
        compressor: Box<dyn Compressor>,
    ) -> Self {
        self.compressors.insert(channel.into(), compressor);
        self
    }

    /// Compress the typed channel of `M` (its fully-qualified name).
    pub fn with_typed_compression<M: prost::Name>(self, compressor: Box<dyn Compressor>) -> Self {
        self.with_compression(M::full_name(), compressor)
    }
}

/// A multicast LCM transmitter.
///
/// Assigns sequence numbers in call order, starting at 0. Owns its socket
/// exclusively and is not thread-safe.
pub struct Transmitter {
    socket: Socket,
    addresses: Vec<SocketAddrV4>,
    sequence_number: u32,
    scratch: BytesMut,
    compressors: HashMap<String, Box<dyn Compressor>>,
}

impl std::fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transmitter")
            .field("addresses", &self.addresses)
            .field("sequence_number", &self.sequence_number)
            .field("compressors", &self.compressors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Transmitter {
    /// Open the socket and configure the outgoing multicast path.
    ///
    /// Without an explicit address this transmits to the default LCM
    /// group and port.
    pub fn dial(options: TransmitterOptions) -> Result<Self> {
        let socket = socket::bind_ephemeral()?;
        socket.set_multicast_ttl_v4(options.ttl)?;
        let interface = match &options.interface {
            Some(name) => iface::by_name(name)?,
            None => iface::default_multicast_interface()?,
        };
        let source = interface
            .addr
            .ok_or_else(|| NetError::InterfaceHasNoAddress {
                name: interface.name.clone(),
            })?;
        socket.set_multicast_if_v4(&source)?;
        socket.set_multicast_loop_v4(options.loopback)?;

        let mut addresses = options.addresses;
        if addresses.is_empty() {
            addresses.push(SocketAddrV4::new(DEFAULT_MULTICAST_GROUP, DEFAULT_PORT));
        }

        debug!(
            interface = %interface.name,
            addresses = ?addresses,
            ttl = options.ttl,
            loopback = options.loopback,
            "dialed LCM multicast"
        );

        Ok(Self {
            socket,
            addresses,
            sequence_number: 0,
            scratch: BytesMut::with_capacity(MAX_DATAGRAM_LEN),
            compressors: options.compressors,
        })
    }

    /// Transmit `data` on `channel`.
    ///
    /// A channel with a registered compressor goes out compressed, with
    /// `z=<name>` appended to the channel. The sequence number is consumed
    /// before marshalling, so a marshal failure leaves a visible gap
    /// rather than reusing a number. The token's deadline is propagated
    /// to the socket write.
    pub fn transmit(&mut self, token: &CancelToken, channel: &str, data: &[u8]) -> Result<()> {
        let mut params = String::new();
        let compressed;
        let payload: &[u8] = match self.compressors.get_mut(channel) {
            Some(compressor) => {
                compressed = compressor.compress(data)?;
                params = format!("z={}", compressor.name());
                &compressed
            }
            None => data,
        };

        let sequence_number = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);

        self.scratch.clear();
        let len = encode_message(channel, &params, sequence_number, payload, &mut self.scratch)?;

        token.check()?;
        socket::set_write_deadline(&self.socket, token)?;

        // Fast path: a single destination needs no batching.
        if let [address] = self.addresses.as_slice() {
            self.socket
                .send_to(&self.scratch[..len], &(*address).into())
                .map_err(NetError::from_socket)?;
            return Ok(());
        }

        let mut sent = 0;
        while sent < self.addresses.len() {
            let accepted =
                batch::send_batch(&self.socket, &self.addresses[sent..], &self.scratch[..len])
                    .map_err(NetError::from_socket)?;
            if accepted == 0 {
                return Err(NetError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "batch send made no progress",
                )));
            }
            sent += accepted;
        }
        Ok(())
    }

    /// Transmit a typed message on the channel named by its
    /// fully-qualified protobuf name.
    pub fn transmit_typed<M>(&mut self, token: &CancelToken, message: &M) -> Result<()>
    where
        M: prost::Message + prost::Name,
    {
        let channel = M::full_name();
        self.transmit_typed_on_channel(token, &channel, message)
    }

    /// Transmit a typed message on an explicit channel.
    pub fn transmit_typed_on_channel<M>(
        &mut self,
        token: &CancelToken,
        channel: &str,
        message: &M,
    ) -> Result<()>
    where
        M: prost::Message,
    {
        let data = message.encode_to_vec();
        self.transmit(token, channel, &data)
    }

    /// Close the transmitter socket.
    pub fn close(self) -> Result<()> {
        // The socket closes on drop; nothing else to release.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_conventions() {
        let options = TransmitterOptions::default();
        assert_eq!(options.ttl, 1);
        assert!(options.loopback);
        assert!(options.addresses.is_empty());
        assert!(options.compressors.is_empty());
    }

    #[test]
    fn typed_compression_keys_on_full_name() {
        let options = TransmitterOptions::new().with_typed_compression::<prost_types::Timestamp>(
            Box::new(lcmbus_compress::Lz4Compressor::new()),
        );
        assert!(options.compressors.contains_key("google.protobuf.Timestamp"));
    }

    #[test]
    fn unknown_interface_rejected() {
        let options = TransmitterOptions::new().with_interface("does-not-exist0");
        let err = Transmitter::dial(options).unwrap_err();
        assert!(matches!(err, NetError::InterfaceNotFound { .. }));
    }
}
