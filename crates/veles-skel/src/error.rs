//! Error types for skeleton parsing.

use thiserror::Error;

/// Errors that can occur when parsing skeleton resources.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload does not start with the skeleton format tag.
    #[error("invalid skeleton magic: expected 0x40001, got {0:#x}")]
    BadMagic(u32),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),
}

/// Result type for skeleton operations.
pub type Result<T> = std::result::Result<T, Error>;
