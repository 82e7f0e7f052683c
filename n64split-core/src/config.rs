//! Declarative split configuration.
//!
//! ```yaml
//! name: Super Mario 64 (U)
//! basename: sm64
//! memory: { rom: 0x1000, ram: 0x80246000 }
//! ranges:
//!   - { start: 0x000000, end: 0x000040, kind: header, label: header }
//!   - { start: 0x001000, end: 0x0E6260, kind: asm, label: main }
//!   - start: 0x108A40
//!     end: 0x114750
//!     kind: mio0
//!     label: font_graphics
//!     textures:
//!       - { offset: 0x0000, width: 16, height: 8, depth: 4, format: ia }
//! procedures:
//!   - { start: 0x80246000, end: 0x80246050, name: entry_point }
//! nested_procedures: [0x80327D58, 0x80327D68, 0x80327D10]
//! inline_levels: [main_level_scripts]
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};

use crate::addr::AddressTranslator;
use crate::procedure::Procedure;
use crate::section::{Section, SectionKind, SectionTable, TextureDescriptor};

/// Numbers may be written as YAML integers or as `"0x..."` strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Text(String),
}

impl Number {
    fn into_u32<E: serde::de::Error>(self) -> std::result::Result<u32, E> {
        let value = match self {
            Number::Int(v) => v,
            Number::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => s.parse(),
                };
                parsed.map_err(|_| E::custom(format!("invalid number: {s:?}")))?
            }
        };
        u32::try_from(value).map_err(|_| E::custom(format!("value 0x{value:X} does not fit in 32 bits")))
    }
}

pub(crate) fn hex_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    Number::deserialize(d)?.into_u32()
}

pub(crate) fn hex_u32_opt<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u32>, D::Error> {
    Option::<Number>::deserialize(d)?.map(Number::into_u32).transpose()
}

fn hex_u32_set<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<BTreeSet<u32>, D::Error> {
    Vec::<Number>::deserialize(d)?
        .into_iter()
        .map(Number::into_u32)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionConfig {
    #[serde(deserialize_with = "hex_u32")]
    pub start: u32,
    #[serde(deserialize_with = "hex_u32")]
    pub end: u32,
    pub kind: SectionKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub textures: Vec<TextureDescriptor>,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub new_segment: bool,
}

impl From<&SectionConfig> for Section {
    fn from(cfg: &SectionConfig) -> Self {
        let mut section = Section::new(cfg.start, cfg.end, cfg.kind);
        if let Some(label) = &cfg.label {
            section = section.with_label(label.clone());
        }
        section.textures = cfg.textures.clone();
        section.reserved = cfg.reserved;
        section.new_segment = cfg.new_segment;
        section
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    #[serde(default)]
    pub name: String,
    /// Prefix for the main listing and raw binary artifacts.
    pub basename: String,
    pub memory: AddressTranslator,
    pub ranges: Vec<SectionConfig>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    /// Procedures nested inside an enclosing procedure that is emitted whole.
    #[serde(default, deserialize_with = "hex_u32_set")]
    pub nested_procedures: BTreeSet<u32>,
    /// Level scripts decoded directly into the main listing.
    #[serde(default)]
    pub inline_levels: BTreeSet<String>,
}

impl SplitConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_yaml(&txt).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn from_yaml(txt: &str) -> Result<Self> {
        let config: SplitConfig = serde_yaml::from_str(txt).context("parse yaml")?;
        if config.basename.trim().is_empty() {
            bail!("basename must not be empty");
        }
        if config.ranges.is_empty() {
            bail!("no ranges declared");
        }
        Ok(config)
    }

    /// Build the section table and check it against the ROM.
    pub fn section_table(&self, rom_len: usize) -> Result<SectionTable> {
        let table = SectionTable::new(self.ranges.iter().map(Section::from).collect());
        table
            .validate(rom_len)
            .with_context(|| format!("invalid configuration for {}", self.basename))?;
        Ok(table)
    }
}
