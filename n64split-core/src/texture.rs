use image::{DynamicImage, GrayAlphaImage, LumaA, Rgba, RgbaImage};

use crate::error::{Result, SplitError};
use crate::section::{TextureDescriptor, TextureFormat};

/// Turns raw texture bytes inside a decoded blob into an image.
pub trait RasterDecoder {
    /// `raw` is the whole decoded blob; the descriptor's offset selects the texture.
    fn decode(&self, raw: &[u8], desc: &TextureDescriptor) -> Result<DynamicImage>;
}

const SKYBOX_TILE: u32 = 32;
const SKYBOX_TILE_BYTES: usize = (SKYBOX_TILE * SKYBOX_TILE * 2) as usize;

/// Decoder for the console's native 16-bit RGBA and intensity/alpha rasters.
#[derive(Debug, Default, Clone, Copy)]
pub struct N64RasterDecoder;

impl RasterDecoder for N64RasterDecoder {
    fn decode(&self, raw: &[u8], desc: &TextureDescriptor) -> Result<DynamicImage> {
        let raster = |reason: String| SplitError::Raster {
            offset: desc.offset,
            reason,
        };
        let needed = desc
            .byte_len()
            .ok_or_else(|| raster(format!("unsupported {}x{} {} raster", desc.width, desc.height, desc.format)))?;
        let data = raw.get(desc.offset as usize..).unwrap_or(&[]);
        if data.len() < needed {
            return Err(raster(format!(
                "needs 0x{:X} bytes, only 0x{:X} left in blob",
                needed,
                data.len()
            )));
        }

        // lengths are checked above, the pixel loops index freely
        let image = match desc.format {
            TextureFormat::Rgba => DynamicImage::ImageRgba8(rgba16(data, desc.width, desc.height)),
            TextureFormat::IntensityAlpha => {
                DynamicImage::ImageLumaA8(ia(data, desc.width, desc.height, desc.depth.unwrap_or(16)))
            }
            TextureFormat::Skybox => DynamicImage::ImageRgba8(skybox(data, desc.width, desc.height)),
        };
        Ok(image)
    }
}

fn scale5(c: u16) -> u8 {
    let c = (c & 0x1F) as u8;
    (c << 3) | (c >> 2)
}

fn rgba5551(hi: u8, lo: u8) -> Rgba<u8> {
    let px = u16::from_be_bytes([hi, lo]);
    Rgba([
        scale5(px >> 11),
        scale5(px >> 6),
        scale5(px >> 1),
        if px & 1 != 0 { 0xFF } else { 0x00 },
    ])
}

fn pixel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// `data` must hold at least `width * height * 2` bytes.
fn rgba16(data: &[u8], width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let i = pixel_index(width, x, y) * 2;
        rgba5551(data[i], data[i + 1])
    })
}

/// `depth` is one of 16, 8, 4 or 1 and `data` is long enough for it.
fn ia(data: &[u8], width: u32, height: u32, depth: u32) -> GrayAlphaImage {
    GrayAlphaImage::from_fn(width, height, |x, y| {
        let n = pixel_index(width, x, y);
        match depth {
            16 => LumaA([data[n * 2], data[n * 2 + 1]]),
            8 => {
                let b = data[n];
                LumaA([(b >> 4) * 0x11, (b & 0x0F) * 0x11])
            }
            4 => {
                let nibble = if n % 2 == 0 { data[n / 2] >> 4 } else { data[n / 2] & 0x0F };
                let i = nibble >> 1;
                LumaA([(i << 5) | (i << 2) | (i >> 1), if nibble & 1 != 0 { 0xFF } else { 0x00 }])
            }
            _ => {
                let bit = (data[n / 8] >> (7 - n % 8)) & 1;
                let v = bit * 0xFF;
                LumaA([v, v])
            }
        }
    })
}

/// A `width/32` by `height/32` grid of 32x32 tiles, each cropped to 31x31
/// where neighbouring tiles overlap.
fn skybox(data: &[u8], width: u32, height: u32) -> RgbaImage {
    let cols = width / SKYBOX_TILE;
    let rows = height / SKYBOX_TILE;

    let visible = SKYBOX_TILE - 1;
    let mut out = RgbaImage::new(width - cols, height - rows);
    for ty in 0..rows {
        for tx in 0..cols {
            let base = pixel_index(cols, tx, ty) * SKYBOX_TILE_BYTES;
            let tile = rgba16(&data[base..base + SKYBOX_TILE_BYTES], SKYBOX_TILE, SKYBOX_TILE);
            for cy in 0..visible {
                for cx in 0..visible {
                    out.put_pixel(tx * visible + cx, ty * visible + cy, *tile.get_pixel(cx, cy));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(format: TextureFormat, width: u32, height: u32, depth: Option<u32>) -> TextureDescriptor {
        TextureDescriptor {
            offset: 0,
            width,
            height,
            depth,
            format,
        }
    }

    #[test]
    fn rgba5551_expands_channels() {
        // red opaque, green transparent
        let img = rgba16(&[0xF8, 0x01, 0x07, 0xC0], 2, 1);
        assert_eq!(img.get_pixel(0, 0), &Rgba([0xFF, 0x00, 0x00, 0xFF]));
        assert_eq!(img.get_pixel(1, 0), &Rgba([0x00, 0xFF, 0x00, 0x00]));
    }

    #[test]
    fn ia_depths() {
        let img = ia(&[0x80, 0xFF], 1, 1, 16);
        assert_eq!(img.get_pixel(0, 0), &LumaA([0x80, 0xFF]));

        let img = ia(&[0xF0], 1, 1, 8);
        assert_eq!(img.get_pixel(0, 0), &LumaA([0xFF, 0x00]));

        let img = ia(&[0xF1], 2, 1, 4);
        assert_eq!(img.get_pixel(0, 0), &LumaA([0xFF, 0xFF]));
        assert_eq!(img.get_pixel(1, 0), &LumaA([0x00, 0xFF]));

        let img = ia(&[0x80], 8, 1, 1);
        assert_eq!(img.get_pixel(0, 0), &LumaA([0xFF, 0xFF]));
        assert_eq!(img.get_pixel(1, 0), &LumaA([0x00, 0x00]));
    }

    #[test]
    fn skybox_drops_overlapping_row_and_column() {
        let mut data = vec![0u8; 2 * SKYBOX_TILE_BYTES];
        // last pixel of the first tile's first row is white and must be cropped
        data[31 * 2] = 0xFF;
        data[31 * 2 + 1] = 0xFF;
        // first pixel of the second tile is white
        data[SKYBOX_TILE_BYTES] = 0xFF;
        data[SKYBOX_TILE_BYTES + 1] = 0xFF;

        let img = N64RasterDecoder
            .decode(&data, &desc(TextureFormat::Skybox, 64, 32, None))
            .unwrap()
            .into_rgba8();
        assert_eq!(img.dimensions(), (62, 31));
        assert_eq!(img.get_pixel(30, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(31, 0), &Rgba([0xFF, 0xFF, 0xFF, 0xFF]));
    }

    #[test]
    fn truncated_raster_is_an_error() {
        let err = N64RasterDecoder.decode(&[0u8; 7], &desc(TextureFormat::Rgba, 2, 2, None));
        assert!(matches!(err, Err(SplitError::Raster { offset: 0, .. })));

        let mut shifted = desc(TextureFormat::IntensityAlpha, 4, 4, Some(8));
        shifted.offset = 0x10;
        let err = N64RasterDecoder.decode(&[0u8; 0x18], &shifted);
        assert!(matches!(err, Err(SplitError::Raster { offset: 0x10, .. })));
    }

    #[test]
    fn huge_dimensions_fail_without_panicking() {
        let err = N64RasterDecoder.decode(&[0u8; 16], &desc(TextureFormat::Rgba, 0x1_0000, 0x8000, None));
        assert!(matches!(err, Err(SplitError::Raster { .. })));
        let err = N64RasterDecoder.decode(&[0u8; 16], &desc(TextureFormat::Rgba, u32::MAX, u32::MAX, None));
        assert!(matches!(err, Err(SplitError::Raster { .. })));
        let err = N64RasterDecoder.decode(&[0u8; 16], &desc(TextureFormat::IntensityAlpha, 4, 4, Some(2)));
        assert!(matches!(err, Err(SplitError::Raster { .. })));
    }
}
