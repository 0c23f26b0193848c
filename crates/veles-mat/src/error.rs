//! Error types for material parsing.

use thiserror::Error;

/// Errors that can occur when parsing material resources.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload does not start with the material format tag.
    #[error("invalid material magic: expected 0x8, got {0:#x}")]
    BadMagic(u32),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),
}

/// Result type for material operations.
pub type Result<T> = std::result::Result<T, Error>;
