//! Error types for texture and raster decoding.

use thiserror::Error;

/// Errors that can occur when decoding texture resources.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload does not start with the expected format tag.
    #[error("invalid resource magic {0:#x}")]
    BadMagic(u32),

    /// The payload is shorter than its header and frame table require.
    #[error("raster data at {offset:#x} extends past the resource (len {len:#x})")]
    Truncated { offset: usize, len: usize },

    /// The bits-per-index field names no supported pixel depth.
    #[error("unsupported pixel depth: {0} bits per index")]
    UnknownDepth(u32),

    /// The encoding field names no supported pixel layout.
    #[error("unsupported pixel encoding {0}")]
    UnknownEncoding(u32),

    /// The size selector matches no known palette bank layout.
    #[error("unknown palette size selector {0:#x}")]
    UnknownPaletteSize(u32),

    /// A pixel indexed past the end of its palette.
    #[error("palette index {index} out of range ({entries} entries)")]
    PaletteIndex { index: u8, entries: usize },

    /// The texture header failed one of its field validations.
    #[error("bad texture header: {0}")]
    BadTextureHeader(String),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// Image encoding error while writing artifacts.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error while writing artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for texture operations.
pub type Result<T> = std::result::Result<T, Error>;
