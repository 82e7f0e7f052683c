//! Section decomposition.
//!
//! The splitter walks the section table once in declared order, filling
//! gaps between sections and dispatching each section by kind into the main
//! listing. A second pass places compressed blobs, relocatable level scripts
//! and behavior scripts in their own `.mio0` section and produces the files
//! they reference. Nothing touches the disk here: the result is a
//! [`SplitOutput`] that an [`ArtifactWriter`] persists.

pub mod code;
pub mod output;

use std::io::Write;
use std::path::{Path, PathBuf};

pub use code::CodeSectionDriver;
pub use output::{Artifact, ArtifactWriter, OutputLayout, Payload};

use crate::config::SplitConfig;
use crate::disasm::{Disassembler, WordDumpDisassembler};
use crate::error::{Result, SplitError};
use crate::header::{RomHeader, HEADER_LEN};
use crate::mio0::{CompressionCodec, Mio0Codec};
use crate::procedure::ProcedureIndex;
use crate::rom::Rom;
use crate::script::{self, decode_behavior_script, write_behavior_script, write_level_script, LevelScriptDecoder};
use crate::section::{Section, SectionKind, SectionTable};
use crate::texture::{N64RasterDecoder, RasterDecoder};

const ASM_HEADER: &str = concat!(
    ".set noat      # allow manual use of $at\n",
    ".set noreorder # don't insert nops after branches\n",
    "\n",
    ".global _start\n",
    "\n",
    "_start:\n",
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOrigin {
    /// Undeclared bytes between two sections.
    Gap,
    Section(SectionKind),
    /// Only space is reserved; the bytes are not reproduced.
    Reserved,
}

/// A ROM range accounted for by the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub origin: SpanOrigin,
}

#[derive(Debug)]
pub struct SplitOutput {
    pub listing: Artifact,
    pub makefile: Artifact,
    /// Every other file, in the order it must be written.
    pub artifacts: Vec<Artifact>,
    /// Gaps and sections in address order.
    pub spans: Vec<Span>,
}

impl SplitOutput {
    pub fn gaps(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| s.origin == SpanOrigin::Gap)
    }

    pub fn files(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts
            .iter()
            .chain(std::iter::once(&self.listing))
            .chain(std::iter::once(&self.makefile))
    }

    pub fn find(&self, path: impl AsRef<Path>) -> Option<&Artifact> {
        let path = path.as_ref();
        self.files().find(|a| a.path == path)
    }

    pub fn write(&self, writer: &ArtifactWriter) -> Result<()> {
        writer.write_all(self.files())
    }
}

/// Accumulates the listing and the manifest across both passes.
#[derive(Default)]
struct SplitState {
    listing: Vec<u8>,
    makefile_rules: Vec<u8>,
    artifacts: Vec<Artifact>,
    spans: Vec<Span>,
    mio0_files: Vec<String>,
    level_files: Vec<String>,
}

pub struct Splitter<'a> {
    rom: &'a Rom,
    config: &'a SplitConfig,
    table: &'a SectionTable,
    procedures: &'a ProcedureIndex,
    layout: OutputLayout,
    disassembler: Box<dyn Disassembler + 'a>,
    codec: Box<dyn CompressionCodec + 'a>,
    raster: Box<dyn RasterDecoder + 'a>,
}

impl<'a> Splitter<'a> {
    pub fn new(
        rom: &'a Rom,
        config: &'a SplitConfig,
        table: &'a SectionTable,
        procedures: &'a ProcedureIndex,
        layout: OutputLayout,
    ) -> Self {
        Self {
            rom,
            config,
            table,
            procedures,
            layout,
            disassembler: Box::new(WordDumpDisassembler),
            codec: Box::new(Mio0Codec),
            raster: Box::new(N64RasterDecoder),
        }
    }

    pub fn with_disassembler(mut self, disassembler: impl Disassembler + 'a) -> Self {
        self.disassembler = Box::new(disassembler);
        self
    }

    pub fn with_codec(mut self, codec: impl CompressionCodec + 'a) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_raster_decoder(mut self, raster: impl RasterDecoder + 'a) -> Self {
        self.raster = Box::new(raster);
        self
    }

    pub fn split(&mut self) -> Result<SplitOutput> {
        let mut state = SplitState::default();
        state.listing.extend_from_slice(ASM_HEADER.as_bytes());

        let mut previous_end = 0u32;
        for section in self.table {
            self.check_bounds(section, previous_end)?;
            if section.start > previous_end {
                self.emit_gap(&mut state, previous_end, section.start)?;
            }
            log::debug!(
                "0x{:06X}-0x{:06X} {} {}",
                section.start,
                section.end,
                section.kind,
                section.label_or_empty()
            );
            if section.reserved {
                write_space(&mut state.listing, section)?;
                state.spans.push(span(section, SpanOrigin::Reserved));
            } else {
                self.emit_section(&mut state, section)?;
                state.spans.push(span(section, SpanOrigin::Section(section.kind)));
            }
            previous_end = section.end;
        }
        let rom_end = self.rom.len() as u32;
        if previous_end < rom_end {
            log::info!(
                "0x{:X} bytes after the last section (0x{:06X}) kept as data",
                rom_end - previous_end,
                previous_end
            );
            self.emit_gap(&mut state, previous_end, rom_end)?;
        }

        write!(state.listing, "\n.section .mio0\n")?;
        for section in self.table.iter().filter(|s| !s.reserved) {
            match section.kind {
                SectionKind::CompressedBlob => self.emit_blob(&mut state, section)?,
                SectionKind::LevelScript if !self.is_inline_level(section) => self.emit_level_file(&mut state, section)?,
                SectionKind::BehaviorScript => self.emit_behavior(&mut state, section)?,
                _ => {}
            }
        }

        let makefile = self.makefile(&state)?;
        Ok(SplitOutput {
            listing: Artifact::text(self.layout.listing(&self.config.basename), state.listing),
            makefile: Artifact::text(self.layout.makefile(), makefile),
            artifacts: state.artifacts,
            spans: state.spans,
        })
    }

    fn check_bounds(&self, section: &Section, previous_end: u32) -> Result<()> {
        let rom_len = self.rom.len();
        if section.start as usize >= rom_len || section.end as usize > rom_len {
            return Err(SplitError::SectionPastEnd {
                start: section.start,
                end: section.end,
                label: section.label_or_empty().to_string(),
                rom_len,
            });
        }
        if section.start < previous_end {
            return Err(SplitError::Overlap {
                start: section.start,
                end: section.end,
                label: section.label_or_empty().to_string(),
                previous_end,
            });
        }
        Ok(())
    }

    fn bin_path(&self, start: u32, label: Option<&str>) -> PathBuf {
        let name = match label {
            Some(label) => format!("{}.{:06X}.{}.bin", self.config.basename, start, label),
            None => format!("{}.{:06X}.bin", self.config.basename, start),
        };
        self.layout.bin_dir().join(name)
    }

    fn emit_gap(&self, state: &mut SplitState, start: u32, end: u32) -> Result<()> {
        let path = self.bin_path(start, None);
        log::debug!("gap 0x{:06X}-0x{:06X}", start, end);
        writeln!(state.listing, "L{:06X}:", start)?;
        writeln!(state.listing, ".incbin \"{}\"", path.display())?;
        state
            .artifacts
            .push(Artifact::verbatim(path, self.rom.slice(start..end)?, start..end));
        state.spans.push(Span {
            start,
            end,
            origin: SpanOrigin::Gap,
        });
        Ok(())
    }

    fn emit_section(&mut self, state: &mut SplitState, section: &Section) -> Result<()> {
        let w = &mut state.listing;
        match section.kind {
            SectionKind::Header => {
                let data = self.rom.bytes(section.start..section.end)?;
                RomHeader::parse(data)?.write_asm(w)?;
                if data.len() > HEADER_LEN {
                    log::warn!(
                        "header at 0x{:06X} is 0x{:X} bytes, emitting the excess as data",
                        section.start,
                        data.len()
                    );
                    for chunk in data[HEADER_LEN..].chunks(16) {
                        writeln!(w, ".byte {}", script::hex_source(chunk))?;
                    }
                }
            }
            SectionKind::RawBinary => {
                let path = self.bin_path(section.start, section.label.as_deref());
                let symbol = section.symbol();
                writeln!(w, "{}:", symbol)?;
                writeln!(w, ".incbin \"{}\"", path.display())?;
                writeln!(w, "{}_end:", symbol)?;
                let range = section.start..section.end;
                state
                    .artifacts
                    .push(Artifact::verbatim(path, self.rom.slice(range.clone())?, range));
            }
            SectionKind::CompressedBlob | SectionKind::BehaviorScript => write_space(w, section)?,
            SectionKind::PointerPair => self.write_pointer_pair(w, section)?,
            SectionKind::Code => {
                if section.new_segment {
                    write!(
                        w,
                        "\n.section .text0x{:08X}, \"ax\"\n\n",
                        self.config.memory.rom_to_ram(section.start)
                    )?;
                }
                let driver = CodeSectionDriver {
                    rom: self.rom.as_slice(),
                    translator: &self.config.memory,
                    procedures: self.procedures,
                    nested: &self.config.nested_procedures,
                };
                driver.run(w, section, &mut *self.disassembler)?;
            }
            SectionKind::LevelScript if self.is_inline_level(section) => {
                let symbol = section.symbol();
                write!(w, "\n.global {}\n", symbol)?;
                write!(w, "\n.global {}_end\n", symbol)?;
                writeln!(w, "{}: # 0x{:X}", symbol, section.start)?;
                let data = self.rom.bytes(section.start..section.end)?;
                let level = LevelScriptDecoder::new(data, section, self.table).decode();
                write_level_script(w, &level)?;
                writeln!(w, "{}_end:", symbol)?;
            }
            SectionKind::LevelScript => write_space(w, section)?,
        }
        Ok(())
    }

    fn write_pointer_pair(&self, w: &mut Vec<u8>, section: &Section) -> Result<()> {
        let data = self.rom.bytes(section.start..section.end)?;
        if data.len() != 8 {
            log::warn!(
                "pointer pair {} at 0x{:06X} is 0x{:X} bytes, expected 8",
                section.symbol(),
                section.start,
                data.len()
            );
        }
        let mut rest = data;
        if data.len() >= 8 {
            let start = self.rom.read_u32_be(section.start)?;
            let end = self.rom.read_u32_be(section.start + 4)?;
            writeln!(
                w,
                ".word {}, {}",
                self.table.resolve_start(start),
                self.table.resolve_end(end)
            )?;
            rest = &data[8..];
        }
        if !rest.is_empty() {
            writeln!(w, ".byte {}", script::hex_source(rest))?;
        }
        Ok(())
    }

    fn is_inline_level(&self, section: &Section) -> bool {
        section
            .label
            .as_ref()
            .is_some_and(|label| self.config.inline_levels.contains(label))
    }

    fn emit_blob(&self, state: &mut SplitState, section: &Section) -> Result<()> {
        let stem = section.file_stem();
        let symbol = section.symbol();
        let mio0_dir = self.layout.mio0_dir();
        let mio0_path = mio0_dir.join(format!("{}.mio0", stem));
        let bin_path = mio0_dir.join(format!("{}.bin", stem));

        let w = &mut state.listing;
        writeln!(w, ".align 4, 0x01")?;
        writeln!(w, ".global {}", symbol)?;
        writeln!(w, "{}:", symbol)?;
        writeln!(w, ".incbin \"{}\"", mio0_path.display())?;
        writeln!(w, "{}_end:", symbol)?;
        state.mio0_files.push(format!("$(MIO0_DIR)/{}.mio0", stem));

        let range = section.start..section.end;
        let compressed = self.rom.slice(range.clone())?;
        match self.codec.decode(&compressed) {
            Ok(decoded) => {
                if !section.textures.is_empty() {
                    log::info!("extracting textures from {}", symbol);
                    let texture_dir = self.layout.texture_dir().join(&stem);
                    write!(state.makefile_rules, "$(MIO0_DIR)/{}.bin:", stem)?;
                    for texture in &section.textures {
                        match self.raster.decode(&decoded, texture) {
                            Ok(image) => {
                                let path = texture_dir.join(texture.file_name());
                                write!(state.makefile_rules, " {}", path.display())?;
                                state.artifacts.push(Artifact::image(path, image));
                            }
                            Err(e) => log::warn!(
                                "{}: skipping texture at 0x{:05X}: {}",
                                symbol,
                                texture.offset,
                                e
                            ),
                        }
                    }
                    write!(state.makefile_rules, "\n\t$(N64GRAPHICS) $@ $^\n\n")?;
                }
                state.artifacts.push(Artifact::binary(bin_path, decoded));
            }
            Err(e) => log::warn!("{}: failed to decompress blob at 0x{:06X}: {}", symbol, section.start, e),
        }
        state.artifacts.push(Artifact::verbatim(mio0_path, compressed, range));
        Ok(())
    }

    fn emit_level_file(&self, state: &mut SplitState, section: &Section) -> Result<()> {
        let stem = section.file_stem();
        let symbol = section.symbol();
        let path = self.layout.level_dir().join(format!("{}.s", stem));

        let data = self.rom.bytes(section.start..section.end)?;
        let level = LevelScriptDecoder::new(data, section, self.table).decode();
        let mut text = Vec::new();
        write_level_script(&mut text, &level)?;
        state.artifacts.push(Artifact::text(path.clone(), text));

        let w = &mut state.listing;
        writeln!(w, ".align 4, 0x01")?;
        writeln!(w, ".global {}", symbol)?;
        writeln!(w, "{}:", symbol)?;
        writeln!(w, ".include \"{}\"", path.display())?;
        writeln!(w, "{}_end:", symbol)?;
        state.level_files.push(format!("$(LEVEL_DIR)/{}.s", stem));
        Ok(())
    }

    fn emit_behavior(&self, state: &mut SplitState, section: &Section) -> Result<()> {
        let symbol = section.symbol();
        let data = self.rom.bytes(section.start..section.end)?;
        let insts = decode_behavior_script(data, section.start, &symbol);

        let w = &mut state.listing;
        write!(w, "\n.global {}\n", symbol)?;
        write!(w, "\n.global {}_end\n", symbol)?;
        writeln!(w, "{}: # 0x{:X}", symbol, section.start)?;
        write_behavior_script(w, &insts)?;
        writeln!(w, "{}_end:", symbol)?;
        Ok(())
    }

    fn makefile(&self, state: &SplitState) -> Result<Vec<u8>> {
        let mut w = Vec::new();
        write!(w, "MIO0_DIR = {}\n\n", self.layout.mio0_dir().display())?;
        write!(w, "TEXTURE_DIR = {}\n\n", self.layout.texture_dir().display())?;
        write!(w, "LEVEL_DIR = {}\n\n", self.layout.level_dir().display())?;
        w.extend_from_slice(&state.makefile_rules);
        write!(w, "\n\nMIO0_FILES =")?;
        for file in &state.mio0_files {
            write!(w, " \\\n{}", file)?;
        }
        write!(w, "\n\nLEVEL_FILES =")?;
        for file in &state.level_files {
            write!(w, " \\\n{}", file)?;
        }
        Ok(w)
    }
}

fn span(section: &Section, origin: SpanOrigin) -> Span {
    Span {
        start: section.start,
        end: section.end,
        origin,
    }
}

fn write_space(w: &mut Vec<u8>, section: &Section) -> std::io::Result<()> {
    writeln!(w, ".space 0x{:05x}, 0x01 # {}", section.len(), section.label_or_empty())
}
