//! This crate implements the core of n64split
//!
//! It takes a flat ROM image and a declarative section map and turns them into an
//! assembler listing plus the binary, script and texture artifacts it references.
//! Instruction decoding, decompression and rasterization sit behind small traits
//! so that the orchestration and the embedded script decoders stay self-contained.

#![allow(clippy::uninlined_format_args)]

pub mod addr;
pub mod config;
pub mod disasm;
pub mod error;
pub mod header;
pub mod mio0;
pub mod procedure;
pub mod rom;
pub mod script;
pub mod section;
pub mod split;
pub mod texture;

pub use addr::AddressTranslator;
pub use config::SplitConfig;
pub use error::{Result, SplitError};
pub use procedure::{Procedure, ProcedureIndex};
pub use rom::Rom;
pub use section::{Section, SectionKind, SectionTable, TextureDescriptor, TextureFormat};
pub use split::{ArtifactWriter, OutputLayout, SplitOutput, Splitter};
