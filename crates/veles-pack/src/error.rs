//! Error types for pack store access.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when reading a volume set.
#[derive(Debug, Error)]
pub enum Error {
    /// A record references a volume file that does not exist.
    #[error("volume {index} missing at {path}")]
    MissingVolume { index: u32, path: PathBuf },

    /// A record's data ran out before its declared size was read.
    #[error("'{name}' ended {missing} byte(s) short of its declared size")]
    ShortRecord { name: String, missing: usize },

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// I/O error on a volume or output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pack operations.
pub type Result<T> = std::result::Result<T, Error>;
