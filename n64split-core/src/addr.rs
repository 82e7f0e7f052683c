use serde::{Deserialize, Serialize};

use crate::config::hex_u32;

/// Affine mapping between ROM offsets and RAM virtual addresses.
///
/// `ram = offset - rom + ram`. Both directions are total over the range the
/// configuration declares; callers are expected to stay inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressTranslator {
    #[serde(deserialize_with = "hex_u32")]
    pub rom: u32,
    #[serde(deserialize_with = "hex_u32")]
    pub ram: u32,
}

impl AddressTranslator {
    pub fn new(rom: u32, ram: u32) -> Self {
        Self { rom, ram }
    }

    #[inline]
    pub fn rom_to_ram(&self, offset: u32) -> u32 {
        offset.wrapping_sub(self.rom).wrapping_add(self.ram)
    }

    #[inline]
    pub fn ram_to_rom(&self, address: u32) -> u32 {
        address.wrapping_sub(self.ram).wrapping_add(self.rom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_is_invertible() {
        let t = AddressTranslator::new(0x1000, 0x8024_6000);
        assert_eq!(t.rom_to_ram(0x1000), 0x8024_6000);
        assert_eq!(t.rom_to_ram(0xF5580), 0x8033_A580);
        assert_eq!(t.ram_to_rom(0x8033_A580), 0xF5580);
        for offset in [0x1000u32, 0x1234, 0x10_0000] {
            assert_eq!(t.ram_to_rom(t.rom_to_ram(offset)), offset);
        }
    }
}
