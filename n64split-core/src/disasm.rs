use std::io::{Result as IoResult, Write};
use std::ops::Range;

use byteorder::{BigEndian, ByteOrder};

use crate::addr::AddressTranslator;
use crate::procedure::Procedure;

/// Instruction-level disassembler driven by the code-section walker.
///
/// The splitter only decides which RAM ranges are procedures and which are
/// unknown; turning a procedure into instructions is up to the implementor.
pub trait Disassembler {
    /// Pre-pass over the code sections (RAM ranges) to find procedures the
    /// configuration does not list.
    fn discover_procedures(
        &mut self,
        _rom: &[u8],
        _code: &[Range<u32>],
        _translator: &AddressTranslator,
    ) -> Vec<Procedure> {
        Vec::new()
    }

    /// Emit one procedure to the listing.
    fn disassemble(
        &mut self,
        w: &mut dyn Write,
        rom: &[u8],
        procedure: &Procedure,
        translator: &AddressTranslator,
    ) -> IoResult<()>;
}

/// Fallback that emits each procedure as a labeled word dump.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordDumpDisassembler;

impl Disassembler for WordDumpDisassembler {
    fn disassemble(
        &mut self,
        w: &mut dyn Write,
        rom: &[u8],
        procedure: &Procedure,
        translator: &AddressTranslator,
    ) -> IoResult<()> {
        let start = translator.ram_to_rom(procedure.start) as usize;
        let end = (translator.ram_to_rom(procedure.end) as usize).min(rom.len());
        writeln!(w)?;
        writeln!(w, "# 0x{:08X} - 0x{:08X} (0x{:06X})", procedure.start, procedure.end, start)?;
        writeln!(w, "{}:", procedure.symbol())?;
        write_words(w, rom.get(start..end).unwrap_or(&[]))
    }
}

/// `.word` lines, four per line, with any trailing bytes as `.byte`.
pub fn write_words(w: &mut dyn Write, bytes: &[u8]) -> IoResult<()> {
    let words = bytes.chunks_exact(4);
    let tail = words.remainder();
    for (i, word) in words.enumerate() {
        let value = BigEndian::read_u32(word);
        if i % 4 == 0 {
            write!(w, "\n .word 0x{:08x}", value)?;
        } else {
            write!(w, ", 0x{:08x}", value)?;
        }
    }
    if !tail.is_empty() {
        write!(w, "\n .byte {}", crate::script::hex_source(tail))?;
    }
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_dump_groups_four_per_line() {
        let bytes = hex::decode("27BDFFE8AFBF001400000000000000000C0000000000000003E00008AA").unwrap();
        let mut out = Vec::new();
        write_words(&mut out, &bytes).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\n .word 0x27bdffe8, 0xafbf0014, 0x00000000, 0x00000000\n .word 0x0c000000, 0x00000000, 0x03e00008\n .byte 0xAA\n"
        );
    }

    #[test]
    fn dumps_procedure_through_translator() {
        let rom = hex::decode("000000000000000027BDFFE803E00008").unwrap();
        let t = AddressTranslator::new(0x8, 0x8000_0000);
        let mut out = Vec::new();
        WordDumpDisassembler
            .disassemble(&mut out, &rom, &Procedure::named(0x8000_0000, 0x8000_0008, "func"), &t)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("func:\n"));
        assert!(text.contains(".word 0x27bdffe8, 0x03e00008"));
    }
}
