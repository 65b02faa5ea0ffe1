use crate::error::Result;
use crate::insn::{assemble, Instruction, JumpCond, Skip};

/// A user-space interpreter for compiled filter programs.
///
/// Implements exactly the instruction forms the compiler emits and mirrors
/// the kernel machine's behavior for them: an out-of-bounds load terminates
/// the program with a verdict of 0. Used by tests and as an explicit
/// user-space evaluation path on platforms without kernel filtering.
#[derive(Debug, Clone)]
pub struct Vm {
    program: Vec<Instruction>,
}

impl Vm {
    /// Validate and wrap a backpatched program.
    pub fn new(program: &[Instruction]) -> Result<Self> {
        // Assembly performs the full validation (resolved skips, load widths).
        assemble(program)?;
        Ok(Self {
            program: program.to_vec(),
        })
    }

    /// Run the program over a raw packet (UDP header included) and return
    /// the number of bytes the filter accepts; 0 rejects the packet.
    pub fn run(&self, packet: &[u8]) -> u32 {
        let mut acc: u32 = 0;
        let mut pc = 0;
        while let Some(insn) = self.program.get(pc) {
            match *insn {
                Instruction::LoadAbsolute { off, size } => {
                    let start = off as usize;
                    let end = start + size as usize;
                    if end > packet.len() {
                        return 0;
                    }
                    acc = packet[start..end]
                        .iter()
                        .fold(0, |word, &b| (word << 8) | u32::from(b));
                    pc += 1;
                }
                Instruction::JumpIf {
                    cond,
                    val,
                    skip_true,
                    skip_false,
                } => {
                    let matched = match cond {
                        JumpCond::Equal => acc == val,
                        JumpCond::NotEqual => acc != val,
                    };
                    let skip = if matched { skip_true } else { skip_false };
                    let Skip::To(n) = skip else { return 0 };
                    pc += 1 + usize::from(n);
                }
                Instruction::RetConstant { val } => return val,
            }
        }
        // Fell off the end of the program.
        0
    }
}
