use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use crate::error::{Result, SplitError};

/// Directory layout of everything a split produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Compressed blobs and their decoded siblings live next to the raw binaries.
    pub fn mio0_dir(&self) -> PathBuf {
        self.bin_dir()
    }

    pub fn texture_dir(&self) -> PathBuf {
        self.root.join("textures")
    }

    pub fn level_dir(&self) -> PathBuf {
        self.root.join("levels")
    }

    pub fn makefile(&self) -> PathBuf {
        self.root.join("Makefile.gen")
    }

    pub fn listing(&self, basename: &str) -> PathBuf {
        self.root.join(format!("{}.s", basename))
    }

    fn directories(&self) -> [PathBuf; 5] {
        [
            self.root.clone(),
            self.bin_dir(),
            self.mio0_dir(),
            self.texture_dir(),
            self.level_dir(),
        ]
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Binary(Bytes),
    Text(Vec<u8>),
    Image(DynamicImage),
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub payload: Payload,
    /// ROM range this artifact reproduces verbatim, if any.
    pub rom_range: Option<Range<u32>>,
}

impl Artifact {
    pub fn verbatim(path: PathBuf, bytes: Bytes, rom_range: Range<u32>) -> Self {
        Self {
            path,
            payload: Payload::Binary(bytes),
            rom_range: Some(rom_range),
        }
    }

    pub fn binary(path: PathBuf, bytes: impl Into<Bytes>) -> Self {
        Self {
            path,
            payload: Payload::Binary(bytes.into()),
            rom_range: None,
        }
    }

    pub fn text(path: PathBuf, text: Vec<u8>) -> Self {
        Self {
            path,
            payload: Payload::Text(text),
            rom_range: None,
        }
    }

    pub fn image(path: PathBuf, image: DynamicImage) -> Self {
        Self {
            path,
            payload: Payload::Image(image),
            rom_range: None,
        }
    }
}

/// Writes artifacts to disk in the order given.
///
/// Order matters to `make`: textures are written before the decoded blob
/// they rebuild, and the decoded blob before its compressed form, so that
/// a fresh split does not look out of date.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    layout: OutputLayout,
}

impl ArtifactWriter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in self.layout.directories() {
            create_dir(&dir)?;
        }
        Ok(())
    }

    pub fn write(&self, artifact: &Artifact) -> Result<()> {
        if let Some(parent) = artifact.path.parent() {
            create_dir(parent)?;
        }
        let output_err = |source| SplitError::Output {
            path: artifact.path.clone(),
            source,
        };
        match &artifact.payload {
            Payload::Binary(bytes) => fs::write(&artifact.path, bytes).map_err(output_err)?,
            Payload::Text(text) => {
                let mut file = fs::File::create(&artifact.path).map_err(output_err)?;
                file.write_all(text).map_err(output_err)?;
            }
            Payload::Image(image) => image.save_with_format(&artifact.path, ImageFormat::Png)?,
        }
        log::debug!("wrote {}", artifact.path.display());
        Ok(())
    }

    pub fn write_all<'a>(&self, artifacts: impl IntoIterator<Item = &'a Artifact>) -> Result<()> {
        self.create_dirs()?;
        let mut count = 0usize;
        for artifact in artifacts {
            self.write(artifact)?;
            count += 1;
        }
        log::info!("wrote {} files under {}", count, self.layout.root().display());
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| SplitError::Output {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("gen");
        assert_eq!(layout.bin_dir(), Path::new("gen/bin"));
        assert_eq!(layout.mio0_dir(), layout.bin_dir());
        assert_eq!(layout.texture_dir(), Path::new("gen/textures"));
        assert_eq!(layout.level_dir(), Path::new("gen/levels"));
        assert_eq!(layout.makefile(), Path::new("gen/Makefile.gen"));
        assert_eq!(layout.listing("sm64"), Path::new("gen/sm64.s"));
    }
}
