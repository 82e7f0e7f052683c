use std::io::{Result as IoResult, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, SplitError};

pub const HEADER_LEN: usize = 0x40;

/// The 64-byte cartridge header at the start of every ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomHeader {
    pub pi_bsd_domain1: [u8; 4],
    pub clock_rate: u32,
    pub entry_point: u32,
    pub release: u32,
    pub checksum1: u32,
    pub checksum2: u32,
    pub unknown1: u32,
    pub unknown2: u32,
    pub name: [u8; 20],
    pub unknown3: u32,
    pub cartridge: u32,
    pub cartridge_id: [u8; 2],
    pub country: u8,
    pub version: u8,
}

impl RomHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(SplitError::OutOfBounds {
                offset: 0,
                len: HEADER_LEN,
                buffer_len: data.len(),
            });
        }
        let word = |off: usize| BigEndian::read_u32(&data[off..off + 4]);
        let mut pi_bsd_domain1 = [0; 4];
        pi_bsd_domain1.copy_from_slice(&data[0x00..0x04]);
        let mut name = [0; 20];
        name.copy_from_slice(&data[0x20..0x34]);

        Ok(Self {
            pi_bsd_domain1,
            clock_rate: word(0x04),
            entry_point: word(0x08),
            release: word(0x0C),
            checksum1: word(0x10),
            checksum2: word(0x14),
            unknown1: word(0x18),
            unknown2: word(0x1C),
            name,
            unknown3: word(0x34),
            cartridge: word(0x38),
            cartridge_id: [data[0x3C], data[0x3D]],
            country: data[0x3E],
            version: data[0x3F],
        })
    }

    /// Emit the header as its own assembler section, one directive per field.
    pub fn write_asm<W: Write + ?Sized>(&self, w: &mut W) -> IoResult<()> {
        let [b0, b1, b2, b3] = self.pi_bsd_domain1;
        writeln!(w, ".section .header")?;
        writeln!(
            w,
            ".byte  0x{:02X}, 0x{:02X}, 0x{:02X}, 0x{:02X} # PI BSD Domain 1 register",
            b0, b1, b2, b3
        )?;
        writeln!(w, ".word  0x{:08X} # clock rate setting", self.clock_rate)?;
        writeln!(w, ".word  0x{:08X} # entry point", self.entry_point)?;
        writeln!(w, ".word  0x{:08X} # release", self.release)?;
        writeln!(w, ".word  0x{:08X} # checksum1", self.checksum1)?;
        writeln!(w, ".word  0x{:08X} # checksum2", self.checksum2)?;
        writeln!(w, ".word  0x{:08X} # unknown", self.unknown1)?;
        writeln!(w, ".word  0x{:08X} # unknown", self.unknown2)?;
        writeln!(w, ".ascii \"{}\" # ROM name: 20 bytes", ascii_escape(&self.name))?;
        writeln!(w, ".word  0x{:08X} # unknown", self.unknown3)?;
        writeln!(w, ".word  0x{:08X} # cartridge", self.cartridge)?;
        writeln!(w, ".ascii \"{}\"       # cartridge ID", ascii_escape(&self.cartridge_id))?;
        writeln!(w, ".ascii \"{}\"        # country", ascii_escape(&[self.country]))?;
        writeln!(w, ".byte  0x{:02X}       # version", self.version)?;
        writeln!(w)?;
        writeln!(w, ".text")?;
        writeln!(w)?;
        Ok(())
    }
}

/// Escape bytes for a `.ascii` string; anything unprintable becomes an octal escape.
pub fn ascii_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}
