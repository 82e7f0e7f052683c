use std::io::{Result as IoResult, Write};

use super::{clamp_len, hex_source};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorInstruction<'a> {
    /// ROM offset of the opcode.
    pub offset: u32,
    pub bytes: &'a [u8],
}

/// Instruction length by opcode.
pub fn behavior_command_len(opcode: u8) -> usize {
    match opcode {
        0x02 | 0x04 | 0x0C | 0x14 | 0x23 | 0x27 | 0x2A | 0x2F => 8,
        0x1C | 0x29 | 0x2B | 0x2C => 12,
        0x30 => 20,
        _ => 4,
    }
}

/// Split a behavior section into instructions.
///
/// `data` is the section's bytes and `base` its ROM offset. The lengths of
/// the returned instructions always sum to `data.len()`.
pub fn decode_behavior_script<'a>(data: &'a [u8], base: u32, label: &str) -> Vec<BehaviorInstruction<'a>> {
    let mut insts = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let len = behavior_command_len(data[pos]);
        let take = clamp_len(pos, len, data.len());
        if take < len {
            log::warn!(
                "behavior {}: command 0x{:02X} at 0x{:06X} needs {} bytes, only {} left in section",
                label,
                data[pos],
                base as usize + pos,
                len,
                take
            );
        }
        insts.push(BehaviorInstruction {
            offset: base + pos as u32,
            bytes: &data[pos..pos + take],
        });
        pos += take;
    }
    insts
}

pub fn write_behavior_script<W: Write + ?Sized>(w: &mut W, insts: &[BehaviorInstruction<'_>]) -> IoResult<()> {
    for inst in insts {
        writeln!(w, ".byte {}", hex_source(inst.bytes))?;
    }
    Ok(())
}
