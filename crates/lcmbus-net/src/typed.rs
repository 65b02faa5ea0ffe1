use std::any::Any;
use std::collections::HashMap;

use prost::{DecodeError, Message, Name};

/// Maps channel names to typed-message decoders.
///
/// The convention is that a typed channel is named after the message's
/// fully-qualified protobuf name (`google.protobuf.Timestamp` and so on).
/// Each channel holds one lazily overwritten instance; receiving on an
/// unregistered channel is not an error, it simply leaves no typed value.
#[derive(Default)]
pub struct TypedRegistry {
    slots: HashMap<String, Box<dyn TypedSlot>>,
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M` under its fully-qualified protobuf name.
    pub fn register<M>(&mut self)
    where
        M: Message + Name + Default + 'static,
    {
        self.register_on_channel::<M>(M::full_name());
    }

    /// Register `M` under an explicit channel name.
    pub fn register_on_channel<M>(&mut self, channel: impl Into<String>)
    where
        M: Message + Default + 'static,
    {
        self.slots
            .insert(channel.into(), Box::new(Slot(M::default())));
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// The registered channel names, for building channel filters.
    pub fn channels(&self) -> Vec<&str> {
        self.slots.keys().map(String::as_str).collect()
    }

    /// Decode `data` into the slot for `channel`. Returns `Ok(false)` for
    /// an unregistered channel.
    pub(crate) fn decode(&mut self, channel: &str, data: &[u8]) -> Result<bool, DecodeError> {
        match self.slots.get_mut(channel) {
            Some(slot) => {
                slot.replace(data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The last decoded instance on `channel`, if its registered type
    /// matches `M`.
    pub fn get<M: 'static>(&self, channel: &str) -> Option<&M> {
        self.slots
            .get(channel)
            .and_then(|slot| slot.as_any().downcast_ref())
    }
}

impl std::fmt::Debug for TypedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRegistry")
            .field("channels", &self.channels())
            .finish()
    }
}

/// Compile a channel filter that accepts exactly the registry's channels.
pub fn typed_message_filter(
    registry: &TypedRegistry,
) -> crate::error::Result<Vec<lcmbus_filter::Instruction>> {
    Ok(lcmbus_filter::channel_filter(&registry.channels())?)
}

trait TypedSlot {
    fn replace(&mut self, data: &[u8]) -> Result<(), DecodeError>;
    fn as_any(&self) -> &dyn Any;
}

struct Slot<M>(M);

impl<M> TypedSlot for Slot<M>
where
    M: Message + Default + 'static,
{
    fn replace(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        self.0 = M::decode(data)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }
}
