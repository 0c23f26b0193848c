//! Texture resources.
//!
//! A texture is a thin header tying an index raster to a palette bank, both
//! named siblings in the archive. Composing the two yields RGBA images, one
//! per (frame, palette) pair. 8-bit frames with encoding 0 are stored in
//! the console's swizzled block order and have to be de-swizzled on read.

use std::fs;

use image::{Rgba, RgbaImage};
use tracing::debug;
use veles_common::BinaryReader;
use veles_wad::{BoxError, ExtractContext, Extracted, Extractor};

use crate::raster::Raster;
use crate::{Error, Result};

/// Payload format tag of texture resources.
pub const TXR_MAGIC: u32 = 0x7;

/// Size of the texture header.
const HEADER_SIZE: usize = 0x58;

/// A parsed texture header.
#[derive(Debug, Clone)]
pub struct Texture {
    /// Name of the raster node holding the palette indices.
    pub raster: Option<String>,
    /// Name of the raster node reinterpreted as the palette bank.
    pub palette: Option<String>,
    /// Name of a lower-resolution variant, when one exists.
    pub sub_texture: Option<String>,
    pub coefficient: i32,
    pub multiplier: f32,
    pub flags: (u16, u16),
}

impl Texture {
    /// Parse and validate a texture header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        let magic = reader.read_u32()?;
        if magic != TXR_MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let raster = reader.read_string_in_buffer(24)?.to_owned();
        let palette = reader.read_string_in_buffer(24)?.to_owned();
        let sub_texture = reader.read_string_in_buffer(24)?.to_owned();
        let coefficient = reader.read_i32()?;
        let multiplier = reader.read_f32()?;
        let flags = (reader.read_u16()?, reader.read_u16()?);
        debug_assert_eq!(reader.position(), HEADER_SIZE);

        if coefficient > 0 {
            return Err(Error::BadTextureHeader(format!(
                "coefficient {coefficient} out of range"
            )));
        }
        // 0 plain, 0x8000 alpha-carrying.
        if flags.0 != 0 && flags.0 != 0x8000 {
            return Err(Error::BadTextureHeader(format!(
                "flags1 {:#06x}",
                flags.0
            )));
        }
        // 1 mask, 0x5d alpha-carrying, 0x51 font.
        if flags.1 != 1 && flags.1 != 0x5d && flags.1 != 0x51 {
            return Err(Error::BadTextureHeader(format!(
                "flags2 {:#06x}",
                flags.1
            )));
        }

        Ok(Self {
            raster: (!raster.is_empty()).then_some(raster),
            palette: (!palette.is_empty()).then_some(palette),
            sub_texture: (!sub_texture.is_empty()).then_some(sub_texture),
            coefficient,
            multiplier,
            flags,
        })
    }
}

/// Storage index of pixel (x, y) in a swizzled 8-bit frame.
///
/// The console stores 8-bit frames as 16x16 blocks of 8x2 columns with a
/// half-block swap on alternating row pairs. Valid for widths of 16 and up.
pub(crate) fn swizzled_index(x: usize, y: usize, width: usize) -> usize {
    let block = (y & !0xF) * width + (x & !0xF) * 2;
    let swap = (((y + 2) >> 2) & 1) * 4;
    let pos_y = (((y & !3) >> 1) + (y & 1)) & 7;
    let column = pos_y * width * 2 + ((x + swap) & 7) * 4;
    let byte = ((y >> 1) & 1) + ((x >> 2) & 2);
    block + column + byte
}

/// Compose one frame of palette indices into an RGBA image.
pub fn compose(
    indices: &[u8],
    width: u32,
    height: u32,
    encoding: u32,
    palette: &[[u8; 4]],
) -> Result<RgbaImage> {
    let mut img = RgbaImage::new(width, height);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let pos = match encoding {
                0 => swizzled_index(x, y, width as usize),
                2 => y * width as usize + x,
                other => return Err(Error::UnknownEncoding(other)),
            };
            let index = *indices.get(pos).ok_or(Error::Truncated {
                offset: pos,
                len: indices.len(),
            })?;
            let color = palette
                .get(index as usize)
                .copied()
                .ok_or(Error::PaletteIndex {
                    index,
                    entries: palette.len(),
                })?;
            img.put_pixel(x as u32, y as u32, Rgba(color));
        }
    }
    Ok(img)
}

/// Extractor writing one PNG per (frame, palette) pair.
pub struct TextureExtractor;

impl Extractor for TextureExtractor {
    fn extract(&self, ctx: &ExtractContext<'_, '_>) -> std::result::Result<Extracted, BoxError> {
        let texture = Texture::parse(ctx.payload()?)?;

        let (Some(raster_name), Some(palette_name)) = (&texture.raster, &texture.palette) else {
            // Headers with no raster/palette pair carry nothing to render.
            return Ok(Extracted {
                cache: Some(Box::new(texture)),
                artifacts: Vec::new(),
            });
        };

        let raster: &Raster = ctx.require_cache(raster_name)?;
        let palette_bank: &Raster = ctx.require_cache(palette_name)?;
        let banks = palette_bank.palettes()?;
        let frames = raster.frames()?;
        let encoding = raster.effective_encoding();

        if let Some(dir) = ctx.out_path().parent() {
            fs::create_dir_all(dir)?;
        }
        let stem = ctx.node().path.replace(':', "-");

        let mut artifacts = Vec::new();
        for (fi, indices) in frames.iter().enumerate() {
            for (pi, palette) in banks.iter().enumerate() {
                let img = compose(indices, raster.width, raster.height, encoding, palette)?;
                let extension = if fi == 0 && pi == 0 {
                    "png".to_owned()
                } else {
                    format!("{fi}.{pi}.png")
                };
                img.save(ctx.out_path().with_extension(&extension))?;
                artifacts.push(format!("{stem}.{extension}"));
            }
        }

        debug!(
            "texture '{}': {} image(s) from '{raster_name}' x '{palette_name}'",
            ctx.node().path,
            artifacts.len()
        );
        Ok(Extracted {
            cache: Some(Box::new(texture)),
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture_payload(raster: &str, palette: &str, flags1: u16, flags2: u16) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[0..4].copy_from_slice(&TXR_MAGIC.to_le_bytes());
        data[4..4 + raster.len()].copy_from_slice(raster.as_bytes());
        data[28..28 + palette.len()].copy_from_slice(palette.as_bytes());
        data[76..80].copy_from_slice(&(-1i32).to_le_bytes());
        data[80..84].copy_from_slice(&1.0f32.to_le_bytes());
        data[84..86].copy_from_slice(&flags1.to_le_bytes());
        data[86..88].copy_from_slice(&flags2.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_header() {
        let data = texture_payload("rock_gfx", "rock_pal", 0x8000, 0x5d);
        let texture = Texture::parse(&data).unwrap();

        assert_eq!(texture.raster.as_deref(), Some("rock_gfx"));
        assert_eq!(texture.palette.as_deref(), Some("rock_pal"));
        assert_eq!(texture.sub_texture, None);
        assert_eq!(texture.coefficient, -1);
        assert_eq!(texture.flags, (0x8000, 0x5d));
    }

    #[test]
    fn test_unknown_flags_rejected() {
        let data = texture_payload("g", "p", 0x1234, 1);
        assert!(matches!(
            Texture::parse(&data),
            Err(Error::BadTextureHeader(_))
        ));

        let data = texture_payload("g", "p", 0, 0x77);
        assert!(matches!(
            Texture::parse(&data),
            Err(Error::BadTextureHeader(_))
        ));
    }

    #[test]
    fn test_swizzle_addressing() {
        assert_eq!(swizzled_index(0, 0, 16), 0);
        assert_eq!(swizzled_index(1, 0, 16), 4);
        assert_eq!(swizzled_index(4, 0, 16), 16);
        assert_eq!(swizzled_index(0, 1, 16), 32);
        assert_eq!(swizzled_index(0, 2, 16), 17);
        assert_eq!(swizzled_index(15, 15, 16), 255);
    }

    #[test]
    fn test_swizzle_is_a_permutation() {
        let mut seen = vec![false; 32 * 32];
        for y in 0..32 {
            for x in 0..32 {
                let pos = swizzled_index(x, y, 32);
                assert!(!seen[pos], "({x},{y}) collides at {pos}");
                seen[pos] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_compose_linear() {
        let palette = [[0, 0, 0, 255], [255, 0, 0, 255]];
        let img = compose(&[0, 1, 1, 0], 2, 2, 2, &palette).unwrap();

        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_compose_rejects_out_of_range_index() {
        let palette = [[0, 0, 0, 255]];
        assert!(matches!(
            compose(&[0, 3, 0, 0], 2, 2, 2, &palette),
            Err(Error::PaletteIndex { index: 3, .. })
        ));
    }

    #[test]
    fn test_compose_deswizzles() {
        // 16x16 frame whose storage byte at swizzled_index(x, y) is the
        // row-major index of (x, y); composing must undo the shuffle.
        let mut indices = vec![0u8; 256];
        for y in 0..16usize {
            for x in 0..16usize {
                indices[swizzled_index(x, y, 16)] = (y * 16 + x) as u8;
            }
        }
        let palette: Vec<[u8; 4]> = (0..=255u8).map(|i| [i, 0, 0, 255]).collect();
        let img = compose(&indices, 16, 16, 0, &palette).unwrap();

        for y in 0..16u32 {
            for x in 0..16u32 {
                assert_eq!(img.get_pixel(x, y).0[0], (y * 16 + x) as u8);
            }
        }
    }
}
