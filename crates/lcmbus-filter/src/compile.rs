use lcmbus_wire::{HEADER_SIZE, MAX_DATAGRAM_LEN, SHORT_MESSAGE_MAGIC};

use crate::error::{FilterError, Result};
use crate::insn::{Instruction, JumpCond, Skip};

/// First byte of the UDP payload in the filter machine's view of a packet.
pub const UDP_PAYLOAD_OFFSET: u32 = 8;

/// Absolute offset of the first channel byte.
const CHANNEL_OFFSET: u32 = UDP_PAYLOAD_OFFSET + HEADER_SIZE as u32;

const ACCEPT: u32 = MAX_DATAGRAM_LEN as u32;

/// A program accepting every short message and nothing else.
pub fn short_message_filter() -> Vec<Instruction> {
    vec![
        Instruction::LoadAbsolute {
            off: UDP_PAYLOAD_OFFSET,
            size: 4,
        },
        Instruction::JumpIf {
            cond: JumpCond::NotEqual,
            val: SHORT_MESSAGE_MAGIC,
            skip_true: Skip::To(1),
            skip_false: Skip::To(0),
        },
        Instruction::RetConstant { val: ACCEPT },
        Instruction::RetConstant { val: 0 },
    ]
}

/// A program accepting short messages whose channel equals any of
/// `channels` (optionally followed by `?params`).
///
/// An empty channel set compiles to [`short_message_filter`]. Compilation
/// fails with [`FilterError::SkipOutOfRange`] when the aggregate channel
/// set is too large for the 8-bit relative jumps of a single program;
/// split the set across narrower filters in that case.
pub fn channel_filter<S: AsRef<str>>(channels: &[S]) -> Result<Vec<Instruction>> {
    if channels.is_empty() {
        return Ok(short_message_filter());
    }
    let mut program = vec![
        Instruction::LoadAbsolute {
            off: UDP_PAYLOAD_OFFSET,
            size: 4,
        },
        Instruction::JumpIf {
            cond: JumpCond::NotEqual,
            val: SHORT_MESSAGE_MAGIC,
            skip_true: Skip::Reject,
            skip_false: Skip::To(0),
        },
    ];
    for channel in channels {
        emit_channel_block(&mut program, channel.as_ref().as_bytes());
    }
    program.push(Instruction::RetConstant { val: 0 });
    program.push(Instruction::RetConstant { val: ACCEPT });
    backpatch(&mut program)?;
    Ok(program)
}

/// Emit the match block for one channel: compare the channel bytes in
/// 4/2/1-byte chunks, then require the following byte to terminate the
/// channel (NUL) or start its query parameters (`?`).
fn emit_channel_block(program: &mut Vec<Instruction>, channel: &[u8]) {
    let mut index = 0;
    while index < channel.len() {
        let (size, val) = match channel.len() - index {
            4.. => (
                4,
                u32::from_be_bytes(channel[index..index + 4].try_into().unwrap()),
            ),
            2..=3 => (
                2,
                u32::from(u16::from_be_bytes(
                    channel[index..index + 2].try_into().unwrap(),
                )),
            ),
            _ => (1, u32::from(channel[index])),
        };
        program.push(Instruction::LoadAbsolute {
            off: CHANNEL_OFFSET + index as u32,
            size,
        });
        program.push(Instruction::JumpIf {
            cond: JumpCond::NotEqual,
            val,
            skip_true: Skip::NextChannel,
            skip_false: Skip::To(0),
        });
        index += size as usize;
    }
    program.push(Instruction::LoadAbsolute {
        off: CHANNEL_OFFSET + channel.len() as u32,
        size: 1,
    });
    program.push(Instruction::JumpIf {
        cond: JumpCond::Equal,
        val: 0x00,
        skip_true: Skip::Accept,
        skip_false: Skip::To(0),
    });
    program.push(Instruction::JumpIf {
        cond: JumpCond::Equal,
        val: u32::from(b'?'),
        skip_true: Skip::Accept,
        skip_false: Skip::NextChannel,
    });
}

/// Rewrite sentinel skips to concrete relative offsets.
///
/// Walks the program in reverse, tracking the position of the next channel
/// block's first channel-offset load; the reject and accept sentinels bind
/// to the two fixed return instructions at the tail.
fn backpatch(program: &mut [Instruction]) -> Result<()> {
    let accept_at = program.len() - 1;
    let reject_at = program.len() - 2;
    // Jumps past the last channel block land on the reject return.
    let mut next_channel_at = reject_at;
    for at in (0..program.len()).rev() {
        match program[at] {
            Instruction::JumpIf {
                cond,
                val,
                skip_true,
                skip_false,
            } => {
                program[at] = Instruction::JumpIf {
                    cond,
                    val,
                    skip_true: resolve(at, skip_true, next_channel_at, reject_at, accept_at)?,
                    skip_false: resolve(at, skip_false, next_channel_at, reject_at, accept_at)?,
                };
            }
            Instruction::LoadAbsolute { off, .. } if off == CHANNEL_OFFSET => {
                next_channel_at = at;
            }
            _ => {}
        }
    }
    Ok(())
}

fn resolve(
    at: usize,
    skip: Skip,
    next_channel_at: usize,
    reject_at: usize,
    accept_at: usize,
) -> Result<Skip> {
    let target = match skip {
        Skip::To(_) => return Ok(skip),
        Skip::NextChannel => next_channel_at,
        Skip::Reject => reject_at,
        Skip::Accept => accept_at,
    };
    let distance = target - at - 1;
    if distance > usize::from(u8::MAX) {
        return Err(FilterError::SkipOutOfRange { at, distance });
    }
    Ok(Skip::To(distance as u8))
}
