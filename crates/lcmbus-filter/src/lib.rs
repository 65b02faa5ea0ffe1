//! Compiles channel-name predicates to classic packet-filter programs.
//!
//! On Linux the assembled program is installed on the receive socket so
//! datagrams on uninteresting channels are rejected in the kernel, before
//! any user-space work. The emitted programs operate on the raw UDP
//! datagram: an 8-byte UDP header followed by the LCM payload.
//!
//! Programs are first emitted with symbolic jumps (the distances to the
//! next channel block and to the final accept/reject returns are unknown
//! mid-emission), then resolved by a reverse backpatch pass, and finally
//! assembled to raw `sock_filter`-shaped instructions.

pub mod compile;
pub mod error;
pub mod insn;
pub mod vm;

pub use compile::{channel_filter, short_message_filter, UDP_PAYLOAD_OFFSET};
pub use error::{FilterError, Result};
pub use insn::{assemble, Instruction, JumpCond, RawInstruction, Skip};
pub use vm::Vm;
