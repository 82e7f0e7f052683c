use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to write {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("section past end: 0x{start:X}, 0x{end:X} ({label}) > 0x{rom_len:X}")]
    SectionPastEnd {
        start: u32,
        end: u32,
        label: String,
        rom_len: usize,
    },

    #[error("empty or inverted section: 0x{start:X}, 0x{end:X} ({label})")]
    InvertedSection { start: u32, end: u32, label: String },

    #[error("section 0x{start:X}-0x{end:X} ({label}) overlaps previous section ending at 0x{previous_end:X}")]
    Overlap {
        start: u32,
        end: u32,
        label: String,
        previous_end: u32,
    },

    #[error("section 0x{start:X} ({label}) is of kind {kind} and cannot carry textures")]
    UnexpectedTextures {
        start: u32,
        label: String,
        kind: String,
    },

    #[error("invalid texture at 0x{offset:X} in {label}: {reason}")]
    InvalidTexture {
        label: String,
        offset: u32,
        reason: String,
    },

    #[error("cannot decode texture at 0x{offset:X}: {reason}")]
    Raster { offset: u32, reason: String },

    #[error("read out of bounds: offset=0x{offset:X}, len=0x{len:X}, buffer_len=0x{buffer_len:X}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    #[error("invalid MIO0 data: {0}")]
    Mio0(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, SplitError>;
