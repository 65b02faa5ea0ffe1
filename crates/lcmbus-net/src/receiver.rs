use std::collections::HashMap;
use std::net::Ipv4Addr;

use socket2::Socket;
use tracing::{debug, info, warn};

use lcmbus_compress::{Decompressor, Lz4Decompressor};
use lcmbus_filter::Instruction;
use lcmbus_wire::ShortMessage;

use crate::batch::{self, RecvSlot};
use crate::error::{NetError, Result};
use crate::iface;
use crate::socket;
use crate::token::CancelToken;
use crate::typed::TypedRegistry;
use crate::{DEFAULT_MULTICAST_GROUP, DEFAULT_PORT};

/// Kernel receive buffer default, from the LCM documentation.
const DEFAULT_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Datagrams pulled from the kernel per wake-up.
const DEFAULT_BATCH_SIZE: usize = 5;

/// Configuration for a [`Receiver`], frozen at construction.
pub struct ReceiverOptions {
    port: u16,
    interface: Option<String>,
    groups: Vec<Ipv4Addr>,
    buffer_size: usize,
    batch_size: usize,
    filter: Vec<Instruction>,
    registry: TypedRegistry,
    decompressors: HashMap<String, Box<dyn Decompressor>>,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        let mut decompressors: HashMap<String, Box<dyn Decompressor>> = HashMap::new();
        decompressors.insert("z=lz4".to_string(), Box::new(Lz4Decompressor::new()));
        Self {
            port: DEFAULT_PORT,
            interface: None,
            groups: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            filter: lcmbus_filter::short_message_filter(),
            registry: TypedRegistry::new(),
            decompressors,
        }
    }
}

impl ReceiverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Receive on a named interface instead of the default.
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    /// Join a multicast group. Repeat to join several.
    pub fn with_group(mut self, group: Ipv4Addr) -> Self {
        self.groups.push(group);
        self
    }

    /// Kernel receive buffer size in bytes.
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Max datagrams received from the kernel in a single batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Install an explicit filter program. An empty program disables
    /// kernel filtering. Ineffectual off Linux.
    pub fn with_filter(mut self, program: Vec<Instruction>) -> Self {
        self.filter = program;
        self
    }

    /// Demultiplex typed messages through `registry`, and narrow the
    /// kernel filter to the registered channels.
    pub fn with_typed_messages(mut self, registry: TypedRegistry) -> Result<Self> {
        self.filter = crate::typed::typed_message_filter(&registry)?;
        self.registry = registry;
        Ok(self)
    }

    /// Register a decompressor for payloads carrying `z=<name>`.
    pub fn with_decompressor(
        mut self,
        name: impl AsRef<str>,
        decompressor: Box<dyn Decompressor>,
    ) -> Self {
        self.decompressors
            .insert(format!("z={}", name.as_ref()), decompressor);
        self
    }
}

/// A multicast LCM receiver.
///
/// Owns its socket exclusively and is not thread-safe: one task constructs
/// it, calls [`Receiver::receive`] in a loop, and closes it.
pub struct Receiver {
    socket: Socket,
    groups: Vec<Ipv4Addr>,
    join_index: u32,
    slots: Vec<RecvSlot>,
    batch_len: usize,
    batch_index: usize,
    message: ShortMessage,
    src: Option<Ipv4Addr>,
    dst: Option<Ipv4Addr>,
    if_index: u32,
    decompressors: HashMap<String, Box<dyn Decompressor>>,
    registry: TypedRegistry,
    typed_ready: bool,
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("groups", &self.groups)
            .field("join_index", &self.join_index)
            .field("batch_len", &self.batch_len)
            .field("batch_index", &self.batch_index)
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("if_index", &self.if_index)
            .field("decompressors", &self.decompressors.keys().collect::<Vec<_>>())
            .field("typed_ready", &self.typed_ready)
            .finish()
    }
}

impl Receiver {
    /// Open the socket, join the configured groups and install the filter.
    ///
    /// Without an explicit group this joins the default LCM group. A named
    /// interface must be up and multicast-capable.
    pub fn bind(options: ReceiverOptions) -> Result<Self> {
        let socket = socket::bind_listener(options.port, options.buffer_size)?;

        let interface = match &options.interface {
            Some(name) => {
                let interface = iface::by_name(name)?;
                if !interface.is_multicast() {
                    return Err(NetError::InterfaceNotMulticast { name: name.clone() });
                }
                if !interface.is_up() {
                    return Err(NetError::InterfaceNotUp { name: name.clone() });
                }
                Some(interface)
            }
            None => None,
        };
        let join_index = interface.as_ref().map(|i| i.index).unwrap_or(0);

        let mut groups = options.groups;
        if groups.is_empty() {
            groups.push(DEFAULT_MULTICAST_GROUP);
        }
        for group in &groups {
            if !group.is_multicast() {
                return Err(NetError::MulticastAddressRequired { addr: *group });
            }
            socket::join_group(&socket, *group, join_index)?;
        }

        socket::enable_packet_info(&socket)?;

        if !options.filter.is_empty() {
            let raw = lcmbus_filter::assemble(&options.filter)?;
            socket::attach_filter(&socket, &raw)?;
        }

        let slots = (0..options.batch_size).map(|_| RecvSlot::new()).collect();

        info!(
            port = options.port,
            groups = ?groups,
            interface = interface.as_ref().map(|i| i.name.as_str()),
            "listening on LCM multicast"
        );

        Ok(Self {
            socket,
            groups,
            join_index,
            slots,
            batch_len: 0,
            batch_index: 0,
            message: ShortMessage::default(),
            src: None,
            dst: None,
            if_index: 0,
            decompressors: options.decompressors,
            registry: options.registry,
            typed_ready: false,
        })
    }

    /// Receive the next message.
    ///
    /// Blocks on the kernel only when the current batch is drained; the
    /// token's deadline is propagated to that read. The received message
    /// is exposed through [`Receiver::message`] and friends until the next
    /// call; payloads carrying a known `z=<name>` parameter are
    /// decompressed in place.
    pub fn receive(&mut self, token: &CancelToken) -> Result<()> {
        self.typed_ready = false;
        if self.batch_index >= self.batch_len {
            token.check()?;
            socket::set_read_deadline(&self.socket, token)?;
            self.batch_index = 0;
            self.batch_len = 0;
            self.batch_len =
                batch::recv_batch(&self.socket, &mut self.slots).map_err(NetError::from_socket)?;
            debug!(count = self.batch_len, "filled receive batch");
        }
        let index = self.batch_index;
        self.batch_index += 1;
        let slot = &self.slots[index];
        let message = ShortMessage::decode(slot.datagram())?;
        self.src = slot.src.map(|s| *s.ip());
        self.dst = slot.dst;
        self.if_index = slot.if_index;
        if message.params.contains('&') {
            return Err(NetError::MultipleParams {
                params: message.params,
            });
        }
        self.message = message;
        if let Some(decompressor) = self.decompressors.get_mut(&self.message.params) {
            self.message.data = decompressor.decompress(&self.message.data)?.into();
        }
        Ok(())
    }

    /// Receive the next message and decode it through the typed registry.
    ///
    /// An unregistered channel is not an error; [`Receiver::typed`] simply
    /// returns `None` for it.
    pub fn receive_typed(&mut self, token: &CancelToken) -> Result<()> {
        self.receive(token)?;
        match self
            .registry
            .decode(&self.message.channel, &self.message.data)
        {
            Ok(decoded) => {
                self.typed_ready = decoded;
                Ok(())
            }
            Err(source) => Err(NetError::TypedDecode {
                channel: self.message.channel.clone(),
                source,
            }),
        }
    }

    /// The last received message.
    pub fn message(&self) -> &ShortMessage {
        &self.message
    }

    /// The typed instance decoded by the last [`Receiver::receive_typed`].
    pub fn typed<M: 'static>(&self) -> Option<&M> {
        if !self.typed_ready {
            return None;
        }
        self.registry.get(&self.message.channel)
    }

    /// Source address of the last received message.
    pub fn source_address(&self) -> Option<Ipv4Addr> {
        self.src
    }

    /// Destination (group) address of the last received message, when the
    /// platform reports it.
    pub fn destination_address(&self) -> Option<Ipv4Addr> {
        self.dst
    }

    /// Arrival interface index of the last received message.
    pub fn interface_index(&self) -> u32 {
        self.if_index
    }

    /// Leave every joined group, then close the socket.
    ///
    /// A failed leave is reported but does not keep the socket open.
    pub fn close(self) -> Result<()> {
        let mut first_err = None;
        for group in &self.groups {
            if let Err(err) = socket::leave_group(&self.socket, *group, self.join_index) {
                warn!(group = %group, error = %err, "failed to leave multicast group");
                if first_err.is_none() {
                    first_err = Some(NetError::Io(err));
                }
            }
        }
        // The socket itself closes on drop.
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_conventions() {
        let options = ReceiverOptions::default();
        assert_eq!(options.port, 7667);
        assert_eq!(options.buffer_size, 2 * 1024 * 1024);
        assert_eq!(options.batch_size, 5);
        assert!(options.groups.is_empty());
        assert_eq!(options.filter, lcmbus_filter::short_message_filter());
        assert!(options.decompressors.contains_key("z=lz4"));
    }

    #[test]
    fn builder_accumulates_groups() {
        let options = ReceiverOptions::new()
            .with_port(7700)
            .with_group(Ipv4Addr::new(239, 0, 0, 1))
            .with_group(Ipv4Addr::new(239, 0, 0, 2))
            .with_batch_size(0);
        assert_eq!(options.port, 7700);
        assert_eq!(options.groups.len(), 2);
        assert_eq!(options.batch_size, 1, "batch size is clamped to at least 1");
    }

    #[test]
    fn non_multicast_group_rejected() {
        let options = ReceiverOptions::new()
            .with_port(0)
            .with_group(Ipv4Addr::new(10, 0, 0, 1));
        let err = Receiver::bind(options).unwrap_err();
        assert!(matches!(
            err,
            NetError::MulticastAddressRequired { addr } if addr == Ipv4Addr::new(10, 0, 0, 1)
        ));
    }

    #[test]
    fn unknown_interface_rejected() {
        let options = ReceiverOptions::new()
            .with_port(0)
            .with_interface("does-not-exist0");
        let err = Receiver::bind(options).unwrap_err();
        assert!(matches!(err, NetError::InterfaceNotFound { .. }));
    }
}
