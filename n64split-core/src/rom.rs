use std::fs;
use std::ops::Range;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::error::{Result, SplitError};

/// Byte order a ROM dump was stored in, detected from the PI BSD register bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrdering {
    /// `.z64`, the native big-endian layout.
    Big,
    /// `.v64`, 16-bit byte-swapped.
    Swapped,
    /// `.n64`, 32-bit little-endian words.
    Little,
}

impl ByteOrdering {
    pub fn detect(data: &[u8]) -> Self {
        match data.get(..4) {
            Some([0x37, 0x80, 0x40, 0x12]) => ByteOrdering::Swapped,
            Some([0x40, 0x12, 0x37, 0x80]) => ByteOrdering::Little,
            _ => ByteOrdering::Big,
        }
    }
}

/// The read-only ROM image, always big-endian once constructed.
#[derive(Debug, Clone)]
pub struct Rom {
    data: Bytes,
}

impl Rom {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(mut data: Vec<u8>) -> Self {
        match ByteOrdering::detect(&data) {
            ByteOrdering::Big => {}
            ByteOrdering::Swapped => {
                log::warn!("ROM is byte-swapped (v64), converting to big-endian");
                for pair in data.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
            ByteOrdering::Little => {
                log::warn!("ROM is little-endian (n64), converting to big-endian");
                for word in data.chunks_exact_mut(4) {
                    word.reverse();
                }
            }
        }
        Self { data: Bytes::from(data) }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).map_or(true, |end| end > self.data.len()) {
            return Err(SplitError::OutOfBounds {
                offset,
                len,
                buffer_len: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn read_u32_be(&self, offset: u32) -> Result<u32> {
        let offset = offset as usize;
        self.check(offset, 4)?;
        Ok(BigEndian::read_u32(&self.data[offset..offset + 4]))
    }

    /// Borrow `range` of the image.
    pub fn bytes(&self, range: Range<u32>) -> Result<&[u8]> {
        let (start, end) = (range.start as usize, range.end as usize);
        self.check(start, end.saturating_sub(start))?;
        Ok(&self.data[start..end])
    }

    /// Zero-copy handle on `range`, used for artifacts that are stored verbatim.
    pub fn slice(&self, range: Range<u32>) -> Result<Bytes> {
        let (start, end) = (range.start as usize, range.end as usize);
        self.check(start, end.saturating_sub(start))?;
        Ok(self.data.slice(start..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_swapped_and_little_endian_dumps() {
        let z64 = vec![0x80, 0x37, 0x12, 0x40, 0x00, 0x00, 0x00, 0x0F];
        let v64 = vec![0x37, 0x80, 0x40, 0x12, 0x00, 0x00, 0x0F, 0x00];
        let n64 = vec![0x40, 0x12, 0x37, 0x80, 0x0F, 0x00, 0x00, 0x00];

        assert_eq!(Rom::from_bytes(v64).as_slice(), &z64[..]);
        assert_eq!(Rom::from_bytes(n64).as_slice(), &z64[..]);
        assert_eq!(Rom::from_bytes(z64.clone()).as_slice(), &z64[..]);
    }

    #[test]
    fn reads_are_bounds_checked() {
        let rom = Rom::from_bytes(vec![0x80, 0x37, 0x12, 0x40, 0xAA]);
        assert_eq!(rom.read_u32_be(0).unwrap(), 0x8037_1240);
        assert_eq!(&rom.bytes(4..5).unwrap()[..], &[0xAA]);
        assert!(rom.read_u32_be(2).is_err());
        assert!(rom.slice(3..6).is_err());
        assert_eq!(&rom.slice(1..3).unwrap()[..], &[0x37, 0x12]);
    }
}
