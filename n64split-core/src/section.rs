use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::{hex_u32, hex_u32_opt};
use crate::error::{Result, SplitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SectionKind {
    #[serde(rename = "header")]
    #[strum(serialize = "header")]
    Header,
    #[serde(rename = "bin")]
    #[strum(serialize = "bin")]
    RawBinary,
    #[serde(rename = "mio0")]
    #[strum(serialize = "mio0")]
    CompressedBlob,
    #[serde(rename = "ptr")]
    #[strum(serialize = "ptr")]
    PointerPair,
    #[serde(rename = "asm")]
    #[strum(serialize = "asm")]
    Code,
    #[serde(rename = "level")]
    #[strum(serialize = "level")]
    LevelScript,
    #[serde(rename = "behavior")]
    #[strum(serialize = "behavior")]
    BehaviorScript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TextureFormat {
    #[serde(rename = "ia")]
    #[strum(serialize = "ia")]
    IntensityAlpha,
    Rgba,
    Skybox,
}

/// One texture inside a decompressed blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDescriptor {
    /// Byte offset within the decompressed blob.
    #[serde(deserialize_with = "hex_u32")]
    pub offset: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default, deserialize_with = "hex_u32_opt")]
    pub depth: Option<u32>,
    pub format: TextureFormat,
}

impl TextureDescriptor {
    /// File name relative to the blob's texture directory.
    pub fn file_name(&self) -> String {
        match self.format {
            TextureFormat::IntensityAlpha => {
                format!("0x{:05X}.ia{}.png", self.offset, self.depth.unwrap_or(16))
            }
            TextureFormat::Rgba => format!("0x{:05X}.png", self.offset),
            TextureFormat::Skybox => format!("0x{:05X}.skybox.png", self.offset),
        }
    }

    /// Bytes the raster occupies in the decoded blob, or `None` when the
    /// dimensions cannot be represented.
    pub fn byte_len(&self) -> Option<usize> {
        let (width, height) = (self.width as usize, self.height as usize);
        let pixels = width.checked_mul(height)?;
        match self.format {
            TextureFormat::Rgba => pixels.checked_mul(2),
            TextureFormat::IntensityAlpha => match self.depth.unwrap_or(16) {
                16 => pixels.checked_mul(2),
                8 => Some(pixels),
                4 => Some(pixels.div_ceil(2)),
                1 => Some(pixels.div_ceil(8)),
                _ => None,
            },
            TextureFormat::Skybox => (width / 32)
                .checked_mul(height / 32)?
                .checked_mul(32 * 32 * 2),
        }
    }

    fn validate(&self, label: &str) -> Result<()> {
        let invalid = |reason: String| SplitError::InvalidTexture {
            label: label.to_string(),
            offset: self.offset,
            reason,
        };
        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!("empty dimensions {}x{}", self.width, self.height)));
        }
        match self.format {
            TextureFormat::Skybox if self.width % 32 != 0 || self.height % 32 != 0 => Err(invalid(
                format!("skybox dimensions {}x{} are not multiples of 32", self.width, self.height),
            )),
            TextureFormat::IntensityAlpha if !matches!(self.depth, Some(1 | 4 | 8 | 16)) => {
                Err(invalid(format!("unsupported IA depth {:?}", self.depth)))
            }
            _ if self.byte_len().is_none() => Err(invalid(format!(
                "dimensions {}x{} are too large",
                self.width, self.height
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub start: u32,
    /// Exclusive.
    pub end: u32,
    pub kind: SectionKind,
    pub label: Option<String>,
    pub textures: Vec<TextureDescriptor>,
    /// Bytes are produced elsewhere at build time; only space is reserved.
    pub reserved: bool,
    /// Open a new `.text` segment at this code section.
    pub new_segment: bool,
}

impl Section {
    pub fn new(start: u32, end: u32, kind: SectionKind) -> Self {
        Self {
            start,
            end,
            kind,
            label: None,
            textures: Vec::new(),
            reserved: false,
            new_segment: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.is_empty()).then_some(label);
        self
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Symbol used in the listing: the label, or `L` + offset when unlabeled.
    pub fn symbol(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("L{:06X}", self.start),
        }
    }

    /// Stem for per-section artifacts: the label, or the bare offset.
    pub fn file_stem(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{:06X}", self.start),
        }
    }

    pub fn label_or_empty(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

/// The declared sections of a ROM, in ascending address order.
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Check every section against the ROM length and each other.
    pub fn validate(&self, rom_len: usize) -> Result<()> {
        let mut previous_end = 0u32;
        for sec in &self.sections {
            let label = sec.label_or_empty().to_string();
            if sec.start >= sec.end {
                return Err(SplitError::InvertedSection {
                    start: sec.start,
                    end: sec.end,
                    label,
                });
            }
            if sec.start as usize >= rom_len || sec.end as usize > rom_len {
                return Err(SplitError::SectionPastEnd {
                    start: sec.start,
                    end: sec.end,
                    label,
                    rom_len,
                });
            }
            if sec.start < previous_end {
                return Err(SplitError::Overlap {
                    start: sec.start,
                    end: sec.end,
                    label,
                    previous_end,
                });
            }
            if !sec.textures.is_empty() && sec.kind != SectionKind::CompressedBlob {
                return Err(SplitError::UnexpectedTextures {
                    start: sec.start,
                    label,
                    kind: sec.kind.to_string(),
                });
            }
            for texture in &sec.textures {
                texture.validate(&label)?;
            }
            previous_end = sec.end;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    /// Index of the section whose `start` is exactly `address`.
    ///
    /// Pointers into the middle of a section deliberately do not match.
    pub fn lookup_by_start(&self, address: u32) -> Option<usize> {
        self.sections.iter().position(|s| s.start == address)
    }

    /// Index of the section whose `end` is exactly `address`.
    pub fn lookup_by_end(&self, address: u32) -> Option<usize> {
        self.sections.iter().position(|s| s.end == address)
    }

    pub fn resolve_start(&self, address: u32) -> String {
        match self.lookup_by_start(address) {
            Some(i) => self.sections[i].symbol(),
            None => format!("0x{:08X}", address),
        }
    }

    pub fn resolve_end(&self, address: u32) -> String {
        match self.lookup_by_end(address) {
            Some(i) => format!("{}_end", self.sections[i].symbol()),
            None => format!("0x{:08X}", address),
        }
    }
}

impl<'a> IntoIterator for &'a SectionTable {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SectionTable {
        SectionTable::new(vec![
            Section::new(0x00, 0x10, SectionKind::RawBinary).with_label("foo"),
            Section::new(0x10, 0x20, SectionKind::RawBinary).with_label("bar"),
            Section::new(0x40, 0x80, SectionKind::CompressedBlob),
        ])
    }

    #[test]
    fn resolves_exact_start_and_end() {
        let t = table();
        assert_eq!(t.resolve_start(0x10), "bar");
        assert_eq!(t.resolve_end(0x10), "foo_end");
        assert_eq!(t.resolve_end(0x20), "bar_end");
        assert_eq!(t.resolve_start(0x40), "L000040");
        assert_eq!(t.resolve_end(0x80), "L000040_end");
    }

    #[test]
    fn interior_pointers_fall_back_to_literal() {
        let t = table();
        assert_eq!(t.resolve_start(0x14), "0x00000014");
        assert_eq!(t.resolve_end(0x41), "0x00000041");
        assert_eq!(t.resolve_start(0x8024_6000), "0x80246000");
        assert_eq!(t.lookup_by_start(0x11), None);
    }

    #[test]
    fn resolution_is_deterministic() {
        let t = table();
        for address in [0u32, 0x10, 0x14, 0x20, 0x80, 0xFFFF_FFFF] {
            assert_eq!(t.resolve_start(address), t.resolve_start(address));
            assert_eq!(t.resolve_end(address), t.resolve_end(address));
        }
    }

    #[test]
    fn validate_rejects_bad_tables() {
        assert!(table().validate(0x80).is_ok());
        assert!(matches!(table().validate(0x7F), Err(SplitError::SectionPastEnd { .. })));

        let overlap = SectionTable::new(vec![
            Section::new(0x00, 0x20, SectionKind::RawBinary),
            Section::new(0x10, 0x30, SectionKind::RawBinary),
        ]);
        assert!(matches!(overlap.validate(0x40), Err(SplitError::Overlap { .. })));

        let mut textured = Section::new(0x00, 0x20, SectionKind::RawBinary);
        textured.textures.push(TextureDescriptor {
            offset: 0,
            width: 32,
            height: 32,
            depth: None,
            format: TextureFormat::Rgba,
        });
        let bad = SectionTable::new(vec![textured]);
        assert!(matches!(bad.validate(0x40), Err(SplitError::UnexpectedTextures { .. })));
    }

    #[test]
    fn skybox_must_be_tile_aligned() {
        let mut blob = Section::new(0x00, 0x20, SectionKind::CompressedBlob).with_label("sky");
        blob.textures.push(TextureDescriptor {
            offset: 0,
            width: 248,
            height: 64,
            depth: None,
            format: TextureFormat::Skybox,
        });
        let t = SectionTable::new(vec![blob]);
        assert!(matches!(t.validate(0x40), Err(SplitError::InvalidTexture { .. })));
    }

    #[test]
    fn oversized_texture_is_rejected() {
        let mut blob = Section::new(0x00, 0x20, SectionKind::CompressedBlob).with_label("huge");
        blob.textures.push(TextureDescriptor {
            offset: 0,
            width: u32::MAX,
            height: u32::MAX,
            depth: None,
            format: TextureFormat::Rgba,
        });
        assert_eq!(blob.textures[0].byte_len(), None);
        let t = SectionTable::new(vec![blob]);
        assert!(matches!(t.validate(0x40), Err(SplitError::InvalidTexture { .. })));
    }

    #[test]
    fn texture_file_names() {
        let mut tex = TextureDescriptor {
            offset: 0x1800,
            width: 32,
            height: 32,
            depth: Some(8),
            format: TextureFormat::IntensityAlpha,
        };
        assert_eq!(tex.file_name(), "0x01800.ia8.png");
        tex.format = TextureFormat::Rgba;
        assert_eq!(tex.file_name(), "0x01800.png");
        tex.format = TextureFormat::Skybox;
        assert_eq!(tex.file_name(), "0x01800.skybox.png");
    }
}
