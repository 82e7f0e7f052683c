use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, SplitError};

/// Decompressor for blobs embedded in the ROM.
pub trait CompressionCodec {
    fn decode(&self, compressed: &[u8]) -> Result<Vec<u8>>;
}

const MIO0_SIGNATURE: [u8; 4] = [b'M', b'I', b'O', b'0'];
const MIO0_HEADER_LEN: usize = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mio0Header {
    pub dest_size: u32,
    pub comp_offset: u32,
    pub uncomp_offset: u32,
}

impl Mio0Header {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIO0_HEADER_LEN {
            return Err(SplitError::Mio0(format!("header truncated: {} bytes", data.len())));
        }
        if data[..4] != MIO0_SIGNATURE {
            return Err(SplitError::Mio0(format!("bad signature {:02X?}", &data[..4])));
        }
        Ok(Self {
            dest_size: BigEndian::read_u32(&data[4..8]),
            comp_offset: BigEndian::read_u32(&data[8..12]),
            uncomp_offset: BigEndian::read_u32(&data[12..16]),
        })
    }
}

/// MIO0 LZ decoder. Encoding is not supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mio0Codec;

impl CompressionCodec for Mio0Codec {
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let header = Mio0Header::parse(data)?;
        let size = header.dest_size as usize;
        // every layout bit yields at most 18 bytes; the header size is untrusted
        let mut out = Vec::with_capacity(size.min(data.len().saturating_mul(8 * 18)));

        let mut layout = MIO0_HEADER_LEN;
        let mut bit = 0u32;
        let mut comp = header.comp_offset as usize;
        let mut uncomp = header.uncomp_offset as usize;
        let truncated = |what: &str, at: usize| SplitError::Mio0(format!("{} truncated at 0x{:X}", what, at));

        while out.len() < size {
            let flags = *data.get(layout).ok_or_else(|| truncated("layout", layout))?;
            let literal = flags & (0x80 >> bit) != 0;
            bit += 1;
            if bit == 8 {
                bit = 0;
                layout += 1;
            }

            if literal {
                let b = *data.get(uncomp).ok_or_else(|| truncated("literal data", uncomp))?;
                out.push(b);
                uncomp += 1;
            } else {
                let pair = data.get(comp..comp + 2).ok_or_else(|| truncated("back-reference data", comp))?;
                comp += 2;
                let len = (pair[0] >> 4) as usize + 3;
                let distance = (((pair[0] & 0x0F) as usize) << 8 | pair[1] as usize) + 1;
                if distance > out.len() {
                    return Err(SplitError::Mio0(format!(
                        "back-reference 0x{:X} before start of output at 0x{:X}",
                        distance,
                        out.len()
                    )));
                }
                let from = out.len() - distance;
                for i in 0..len.min(size - out.len()) {
                    let b = out[from + i];
                    out.push(b);
                }
            }
        }

        Ok(out)
    }
}
