//! Indexed raster resources.
//!
//! A raster holds one or more frames of palette indices. The same resource
//! format also carries palette banks: a texture names one raster for its
//! indices and another whose data is reinterpreted as palettes.

use tracing::debug;
use veles_common::BinaryReader;
use veles_wad::{BoxError, ExtractContext, Extracted, Extractor};

use crate::{Error, Result};

/// Payload format tag of raster resources.
pub const GFX_MAGIC: u32 = 0xC;

/// Size of the fixed raster header.
const HEADER_SIZE: usize = 24;

/// Palette entry remap applied to 256-entry banks, per 8-entry block.
const PALETTE_REMAP: [usize; 4] = [0, 2, 1, 3];

/// A parsed raster resource.
///
/// Frame data is kept raw; [`Raster::frames`] expands it to one byte per
/// index and [`Raster::palettes`] reinterprets it as a palette bank.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub encoding: u32,
    /// Bits per palette index, 4 or 8.
    pub bpi: u32,
    pub frame_count: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Parse a raster from its payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(payload);

        let magic = reader.read_u32()?;
        if magic != GFX_MAGIC {
            return Err(Error::BadMagic(magic));
        }
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let encoding = reader.read_u32()?;
        let bpi = reader.read_u32()?;
        let frame_count = reader.read_u32()?;

        if bpi != 4 && bpi != 8 {
            return Err(Error::UnknownDepth(bpi));
        }

        Ok(Self {
            width,
            height,
            encoding,
            bpi,
            frame_count,
            data: payload[HEADER_SIZE..].to_vec(),
        })
    }

    /// Pixel layout after depth normalization: 4-bit frames are stored
    /// linearly regardless of the header's encoding field.
    pub fn effective_encoding(&self) -> u32 {
        if self.bpi == 4 {
            2
        } else {
            self.encoding
        }
    }

    /// All frames, expanded to one palette index per byte.
    pub fn frames(&self) -> Result<Vec<Vec<u8>>> {
        let frame_len = (self.width * self.height * self.bpi) as usize / 8;
        let mut frames = Vec::with_capacity(self.frame_count as usize);
        for i in 0..self.frame_count as usize {
            let offset = i * frame_len;
            let raw = self
                .data
                .get(offset..offset + frame_len)
                .ok_or(Error::Truncated {
                    offset: HEADER_SIZE + offset,
                    len: HEADER_SIZE + self.data.len(),
                })?;
            frames.push(if self.bpi == 4 {
                // Low nibble first.
                raw.iter()
                    .flat_map(|&byte| [byte & 0xF, byte >> 4])
                    .collect()
            } else {
                raw.to_vec()
            });
        }
        Ok(frames)
    }

    /// Reinterpret the resource as a bank of RGBA palettes.
    ///
    /// The width field selects the layout: `0x10` is a 256-entry palette
    /// with its 8-entry blocks stored in `[0, 2, 1, 3]` order, `0x8` a
    /// linear 16-entry one. Stored alpha covers 0..=128 and is rescaled to
    /// the full byte range.
    pub fn palettes(&self) -> Result<Vec<Vec<[u8; 4]>>> {
        let (entries, remap) = match self.width {
            0x10 => (256usize, true),
            0x8 => (16, false),
            other => return Err(Error::UnknownPaletteSize(other)),
        };

        let mut banks = Vec::with_capacity(self.frame_count as usize);
        let mut offset = 0;
        for _ in 0..self.frame_count {
            let raw = self
                .data
                .get(offset..offset + entries * 4)
                .ok_or(Error::Truncated {
                    offset: HEADER_SIZE + offset,
                    len: HEADER_SIZE + self.data.len(),
                })?;
            offset += entries * 4;

            let mut bank = vec![[0u8; 4]; entries];
            for (i, entry) in raw.chunks_exact(4).enumerate() {
                let alpha = (entry[3] as u32 * 255 / 128).min(255) as u8;
                let position = if remap {
                    let block = i / 8;
                    i % 8 + (PALETTE_REMAP[block % 4] + block / 4 * 4) * 8
                } else {
                    i
                };
                bank[position] = [entry[0], entry[1], entry[2], alpha];
            }
            banks.push(bank);
        }
        Ok(banks)
    }
}

/// Extractor caching parsed rasters for dependent textures.
pub struct RasterExtractor;

impl Extractor for RasterExtractor {
    fn extract(&self, ctx: &ExtractContext<'_, '_>) -> std::result::Result<Extracted, BoxError> {
        let raster = Raster::parse(ctx.payload()?)?;
        debug!(
            "raster '{}': {}x{} @ {} bpi, {} frame(s)",
            ctx.node().path,
            raster.width,
            raster.height,
            raster.bpi,
            raster.frame_count
        );
        Ok(Extracted {
            cache: Some(Box::new(raster)),
            artifacts: Vec::new(),
        })
    }
}
