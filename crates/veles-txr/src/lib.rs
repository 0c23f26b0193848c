//! Texture and raster resource decoding.
//!
//! Rasters ([`Raster`]) carry frames of palette indices; the same format
//! doubles as a palette bank. Textures ([`Texture`]) name one of each and
//! compose them into RGBA images written as PNG.

mod error;
pub mod raster;
pub mod texture;

pub use error::{Error, Result};
pub use raster::{Raster, RasterExtractor, GFX_MAGIC};
pub use texture::{compose, Texture, TextureExtractor, TXR_MAGIC};
