use std::io::{Result as IoResult, Write};

use byteorder::{BigEndian, ByteOrder};

use super::{clamp_len, hex_source};
use crate::section::{Section, SectionTable};

/// One phase A command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelCommand<'a> {
    /// 0x00/0x17/0x18/0x1A: load, copy or decompress a ROM range into a RAM segment.
    Load {
        offset: u32,
        head: [u8; 4],
        start: String,
        end: String,
        /// Bytes past the two pointers, emitted as words.
        extra: &'a [u8],
    },
    /// 0x16: load code into RAM.
    LoadCode {
        offset: u32,
        head: [u8; 4],
        dst: String,
        start: String,
        end: String,
    },
    Raw { offset: u32, bytes: &'a [u8] },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutInstruction<'a> {
    pub offset: u32,
    /// Nesting marker for the listing only.
    pub indent: usize,
    pub bytes: &'a [u8],
}

/// Cursor threaded through phase B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutState {
    /// Position relative to the section start.
    pub pos: usize,
    pub indent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelScript<'a> {
    pub symbol: String,
    pub commands: Vec<LevelCommand<'a>>,
    /// ROM offset where phase A stopped.
    pub commands_end: u32,
    pub padding: &'a [u8],
    /// ROM offset of the first layout instruction.
    pub layout_start: u32,
    pub layout: Vec<LayoutInstruction<'a>>,
    /// ROM offsets of layout opcodes with no known length.
    pub anomalies: Vec<u32>,
}

/// Layout instruction length by opcode; `None` for opcodes outside the known table.
pub fn layout_command_len(opcode: u8, param: u8) -> Option<usize> {
    let len = match opcode {
        0x00 | 0x01 | 0x03 | 0x04 | 0x05 | 0x09 | 0x0B | 0x0C | 0x17 | 0x20 => 4,
        0x02 | 0x0D | 0x0E | 0x14 | 0x15 | 0x16 | 0x18 | 0x19 | 0x1D => 8,
        0x08 | 0x11 | 0x13 | 0x1C => 12,
        0x10 => 16,
        0x0F => 20,
        0x0A if param != 0 => 12,
        0x0A => 8,
        _ => return None,
    };
    Some(len)
}

/// Decodes one level-script section.
///
/// Phase A is the loading command stream, terminated by a command whose
/// length byte is zero. After padding up to the next 16-byte boundary the
/// remainder of the section is the geometry layout stream (phase B).
pub struct LevelScriptDecoder<'a> {
    data: &'a [u8],
    base: u32,
    symbol: String,
    table: &'a SectionTable,
}

impl<'a> LevelScriptDecoder<'a> {
    /// `data` must be exactly the bytes of `section`.
    pub fn new(data: &'a [u8], section: &Section, table: &'a SectionTable) -> Self {
        Self {
            data,
            base: section.start,
            symbol: section.symbol(),
            table,
        }
    }

    fn rom_offset(&self, pos: usize) -> u32 {
        self.base + pos as u32
    }

    fn word(&self, pos: usize) -> u32 {
        BigEndian::read_u32(&self.data[pos..pos + 4])
    }

    fn head(&self, pos: usize) -> [u8; 4] {
        [self.data[pos], self.data[pos + 1], self.data[pos + 2], self.data[pos + 3]]
    }

    pub fn decode(&self) -> LevelScript<'a> {
        let (commands, commands_end) = self.decode_commands();
        let (padding, layout_start) = self.align(commands_end);
        let (layout, anomalies) = self.decode_layout(layout_start);

        LevelScript {
            symbol: self.symbol.clone(),
            commands,
            commands_end: self.rom_offset(commands_end),
            padding,
            layout_start: self.rom_offset(layout_start),
            layout,
            anomalies,
        }
    }

    /// Phase A. Returns the commands and the position of the terminator.
    pub fn decode_commands(&self) -> (Vec<LevelCommand<'a>>, usize) {
        let data = self.data;
        let mut commands = Vec::new();
        let mut pos = 0usize;

        while pos < data.len() {
            let Some(&len) = data.get(pos + 1) else {
                log::warn!(
                    "level {}: command at 0x{:06X} has no length byte before section end",
                    self.symbol,
                    self.rom_offset(pos)
                );
                break;
            };
            // length 0 ends the command stream
            if len == 0 {
                break;
            }
            let len = len as usize;
            let take = clamp_len(pos, len, data.len());
            let opcode = data[pos];
            let offset = self.rom_offset(pos);

            let command = if take < len {
                log::warn!(
                    "level {}: command 0x{:02X} at 0x{:06X} runs 0x{:X} bytes past section end",
                    self.symbol,
                    opcode,
                    offset,
                    len - take
                );
                LevelCommand::Raw {
                    offset,
                    bytes: &data[pos..pos + take],
                }
            } else {
                self.decode_command(pos, opcode, len)
            };
            commands.push(command);
            pos += take;
        }

        (commands, pos)
    }

    fn decode_command(&self, pos: usize, opcode: u8, len: usize) -> LevelCommand<'a> {
        let data = self.data;
        let offset = self.rom_offset(pos);
        match opcode {
            0x00 | 0x17 | 0x18 | 0x1A if len >= 12 => LevelCommand::Load {
                offset,
                head: self.head(pos),
                start: self.table.resolve_start(self.word(pos + 4)),
                end: self.table.resolve_end(self.word(pos + 8)),
                extra: &data[pos + 12..pos + len],
            },
            0x16 if len == 16 => LevelCommand::LoadCode {
                offset,
                head: self.head(pos),
                dst: self.table.resolve_start(self.word(pos + 4)),
                start: self.table.resolve_start(self.word(pos + 8)),
                end: self.table.resolve_end(self.word(pos + 12)),
            },
            0x00 | 0x16 | 0x17 | 0x18 | 0x1A => {
                log::warn!(
                    "level {}: command 0x{:02X} at 0x{:06X} has unexpected length 0x{:X}, kept as raw bytes",
                    self.symbol,
                    opcode,
                    offset,
                    len
                );
                LevelCommand::Raw {
                    offset,
                    bytes: &data[pos..pos + len],
                }
            }
            _ => LevelCommand::Raw {
                offset,
                bytes: &data[pos..pos + len],
            },
        }
    }

    /// Phase transition: pad from `pos` up to the next 16-byte ROM boundary.
    pub fn align(&self, pos: usize) -> (&'a [u8], usize) {
        let offset = self.rom_offset(pos) as usize;
        let aligned = (offset + 0x0F) & !0x0F;
        let want = aligned - offset;
        let take = clamp_len(pos, want, self.data.len());
        (&self.data[pos..pos + take], pos + take)
    }

    /// Decode a single layout instruction at `state` and return the state after it.
    pub fn layout_step(&self, state: LayoutState) -> (LayoutInstruction<'a>, LayoutState, bool) {
        let data = self.data;
        let LayoutState { pos, mut indent } = state;
        let opcode = data[pos];
        let param = data.get(pos + 1).copied().unwrap_or(0);

        let (len, known) = match layout_command_len(opcode, param) {
            Some(len) => (len, true),
            None => {
                log::warn!(
                    "level {}: unknown layout opcode 0x{:02X} at 0x{:06X}, assuming 4 bytes",
                    self.symbol,
                    opcode,
                    self.rom_offset(pos)
                );
                (4, false)
            }
        };
        let take = clamp_len(pos, len, data.len());
        if take < len {
            log::warn!(
                "level {}: layout opcode 0x{:02X} at 0x{:06X} truncated by section end",
                self.symbol,
                opcode,
                self.rom_offset(pos)
            );
        }

        if opcode == 0x05 && indent > 1 {
            indent -= 2;
        }
        let inst = LayoutInstruction {
            offset: self.rom_offset(pos),
            indent,
            bytes: &data[pos..pos + take],
        };
        if opcode == 0x04 {
            indent += 2;
        }

        (inst, LayoutState { pos: pos + take, indent }, known)
    }

    /// Phase B, from `start` to the end of the section.
    pub fn decode_layout(&self, start: usize) -> (Vec<LayoutInstruction<'a>>, Vec<u32>) {
        let mut layout = Vec::new();
        let mut anomalies = Vec::new();
        let mut state = LayoutState { pos: start, indent: 0 };
        while state.pos < self.data.len() {
            let (inst, next, known) = self.layout_step(state);
            if !known {
                anomalies.push(inst.offset);
            }
            layout.push(inst);
            state = next;
        }
        (layout, anomalies)
    }
}

pub fn write_level_script<W: Write + ?Sized>(w: &mut W, script: &LevelScript<'_>) -> IoResult<()> {
    for command in &script.commands {
        match command {
            LevelCommand::Load {
                head,
                start,
                end,
                extra,
                ..
            } => {
                write!(w, ".word 0x{}, {}, {}", hex_word(head), start, end)?;
                for group in extra.chunks(4) {
                    write!(w, ", 0x{}", hex_word(group))?;
                }
                writeln!(w)?;
            }
            LevelCommand::LoadCode {
                head, dst, start, end, ..
            } => {
                writeln!(w, ".word 0x{}, {}, {}, {}", hex_word(head), dst, start, end)?;
            }
            LevelCommand::Raw { bytes, .. } => {
                writeln!(w, ".byte {}", hex_source(bytes))?;
            }
        }
    }
    if !script.padding.is_empty() {
        writeln!(w, "# begin {} alignment 0x{:X}", script.symbol, script.commands_end)?;
        writeln!(w, ".byte {}", hex_source(script.padding))?;
    }
    writeln!(w, "# begin {} geo 0x{:X}", script.symbol, script.layout_start)?;
    for inst in &script.layout {
        writeln!(w, ".byte {:indent$}{}", "", hex_source(inst.bytes), indent = inst.indent)?;
    }
    Ok(())
}

fn hex_word(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
