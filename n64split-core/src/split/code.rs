use std::collections::BTreeSet;
use std::io::{Result as IoResult, Write};

use crate::addr::AddressTranslator;
use crate::disasm::{write_words, Disassembler};
use crate::procedure::ProcedureIndex;
use crate::section::Section;

/// Walks the procedures of one code section in RAM order.
///
/// Every byte of the section ends up either inside a procedure handed to the
/// disassembler or inside an "unknown" word dump.
pub struct CodeSectionDriver<'a> {
    pub rom: &'a [u8],
    pub translator: &'a AddressTranslator,
    pub procedures: &'a ProcedureIndex,
    /// Procedure starts that are emitted as part of their enclosing procedure.
    pub nested: &'a BTreeSet<u32>,
}

impl<'a> CodeSectionDriver<'a> {
    pub fn run(&self, w: &mut dyn Write, section: &Section, disassembler: &mut dyn Disassembler) -> IoResult<()> {
        let ram_start = self.translator.rom_to_ram(section.start);
        let ram_end = self.translator.rom_to_ram(section.end);
        let mut previous_end = ram_start;

        for procedure in self.procedures.within(ram_start, ram_end) {
            let nested = self.nested.contains(&procedure.start);
            if procedure.start > previous_end {
                self.write_unknown(w, previous_end, procedure.start)?;
            } else if procedure.start < previous_end && !nested {
                log::warn!(
                    "{}: procedure {} at 0x{:08X} starts before previous end 0x{:08X}",
                    section.symbol(),
                    procedure.symbol(),
                    procedure.start,
                    previous_end
                );
            }

            if nested {
                log::debug!("skipping nested procedure 0x{:08X}", procedure.start);
            } else {
                if procedure.end > ram_end {
                    log::warn!(
                        "{}: procedure {} ends at 0x{:08X}, past section end 0x{:08X}",
                        section.symbol(),
                        procedure.symbol(),
                        procedure.end,
                        ram_end
                    );
                }
                disassembler.disassemble(w, self.rom, procedure, self.translator)?;
            }

            previous_end = previous_end.max(procedure.end);
            if previous_end >= ram_end {
                break;
            }
        }

        if previous_end < ram_end {
            self.write_unknown(w, previous_end, ram_end)?;
        }
        Ok(())
    }

    fn write_unknown(&self, w: &mut dyn Write, ram_start: u32, ram_end: u32) -> IoResult<()> {
        let rom_start = self.translator.ram_to_rom(ram_start);
        let rom_end = self.translator.ram_to_rom(ram_end);
        write!(
            w,
            "\n# unknown assembly section {:X}-{:X} ({:06X}-{:06X}) [{:X}]",
            ram_start,
            ram_end,
            rom_start,
            rom_end,
            ram_end - ram_start
        )?;
        let bytes = self.rom.get(rom_start as usize..rom_end as usize).unwrap_or(&[]);
        write_words(w, bytes)?;
        writeln!(w, "# end unknown section")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disasm::WordDumpDisassembler;
    use crate::procedure::Procedure;
    use crate::section::SectionKind;

    struct Recorder(Vec<u32>);

    impl Disassembler for Recorder {
        fn disassemble(
            &mut self,
            w: &mut dyn Write,
            _rom: &[u8],
            procedure: &Procedure,
            _translator: &AddressTranslator,
        ) -> IoResult<()> {
            self.0.push(procedure.start);
            writeln!(w, "{}:", procedure.symbol())
        }
    }

    fn rom() -> Vec<u8> {
        (0u8..0x40).collect()
    }

    #[test]
    fn gaps_between_procedures_become_unknown_dumps() {
        let rom = rom();
        let translator = AddressTranslator::new(0x0, 0x8000_0000);
        let procedures = ProcedureIndex::build([
            Procedure::new(0x8000_0008, 0x8000_0010),
            Procedure::new(0x8000_0020, 0x8000_0030),
        ]);
        let nested = BTreeSet::new();
        let driver = CodeSectionDriver {
            rom: &rom,
            translator: &translator,
            procedures: &procedures,
            nested: &nested,
        };
        let section = Section::new(0x00, 0x40, SectionKind::Code);
        let mut out = Vec::new();
        let mut recorder = Recorder(Vec::new());
        driver.run(&mut out, &section, &mut recorder).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(recorder.0, vec![0x8000_0008, 0x8000_0020]);
        assert!(text.starts_with("\n# unknown assembly section 80000000-80000008 (000000-000008) [8]\n .word 0x00010203, 0x04050607\n# end unknown section\n"));
        assert!(text.contains("# unknown assembly section 80000010-80000020 (000010-000020) [10]"));
        // tail after the last procedure
        assert!(text.contains("# unknown assembly section 80000030-80000040 (000030-000040) [10]"));
    }

    #[test]
    fn nested_procedures_are_skipped_and_end_is_monotonic() {
        let rom = rom();
        let translator = AddressTranslator::new(0x0, 0x8000_0000);
        let procedures = ProcedureIndex::build([
            Procedure::new(0x8000_0000, 0x8000_0040),
            Procedure::new(0x8000_0010, 0x8000_0018),
        ]);
        let nested = BTreeSet::from([0x8000_0010]);
        let driver = CodeSectionDriver {
            rom: &rom,
            translator: &translator,
            procedures: &procedures,
            nested: &nested,
        };
        let section = Section::new(0x00, 0x40, SectionKind::Code);
        let mut out = Vec::new();
        let mut recorder = Recorder(Vec::new());
        driver.run(&mut out, &section, &mut recorder).unwrap();

        assert_eq!(recorder.0, vec![0x8000_0000]);
        assert!(!String::from_utf8(out).unwrap().contains("unknown"));
    }

    #[test]
    fn overlapping_procedures_are_both_disassembled() {
        let rom = rom();
        let translator = AddressTranslator::new(0x0, 0x8000_0000);
        let procedures = ProcedureIndex::build([
            Procedure::new(0x8000_0000, 0x8000_0020),
            Procedure::new(0x8000_0010, 0x8000_0030),
            Procedure::new(0x8000_0038, 0x8000_003C),
        ]);
        let nested = BTreeSet::new();
        let driver = CodeSectionDriver {
            rom: &rom,
            translator: &translator,
            procedures: &procedures,
            nested: &nested,
        };
        let section = Section::new(0x00, 0x40, SectionKind::Code);
        let mut out = Vec::new();
        let mut recorder = Recorder(Vec::new());
        driver.run(&mut out, &section, &mut recorder).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(recorder.0, vec![0x8000_0000, 0x8000_0010, 0x8000_0038]);
        // the overlap itself is never dumped
        assert!(!text.contains("80000010-"));
        assert!(!text.contains("80000020-"));
        assert!(text.contains("# unknown assembly section 80000030-80000038 (000030-000038) [8]"));
        assert!(text.contains("# unknown assembly section 8000003C-80000040 (00003C-000040) [4]"));
    }

    #[test]
    fn section_without_procedures_is_one_dump() {
        let rom = rom();
        let translator = AddressTranslator::new(0x20, 0x8000_0000);
        let procedures = ProcedureIndex::build(Vec::<Procedure>::new());
        let nested = BTreeSet::new();
        let driver = CodeSectionDriver {
            rom: &rom,
            translator: &translator,
            procedures: &procedures,
            nested: &nested,
        };
        let mut out = Vec::new();
        driver
            .run(&mut out, &Section::new(0x20, 0x30, SectionKind::Code), &mut WordDumpDisassembler)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\n# unknown assembly section 80000000-80000010 (000020-000030) [10]\n .word 0x20212223, 0x24252627, 0x28292a2b, 0x2c2d2e2f\n# end unknown section\n"
        );
    }
}
