//! Error types for mesh decoding.

use thiserror::Error;

use crate::vif::RunClass;

/// Errors that can occur when decoding mesh resources.
#[derive(Debug, Error)]
pub enum Error {
    /// The resource does not start with a known mesh format tag.
    #[error("invalid mesh magic {0:#x}")]
    BadMagic(u32),

    /// A structural offset points outside the resource buffer.
    #[error("mesh structure at {offset:#x} extends past the resource (len {len:#x})")]
    Truncated { offset: usize, len: usize },

    /// Two attribute runs of the same semantic class arrived before a flush.
    #[error("{class} run at {offset:#x} but a {class} run is already pending")]
    DuplicateAttribute { class: RunClass, offset: usize },

    /// An unpack run whose shape maps to no known attribute class.
    #[error(
        "unhandled attribute shape at {offset:#x}: cmd {cmd:#04x}, {width} bit x {components}, signed: {signed}"
    )]
    UnhandledAttributeShape {
        offset: usize,
        cmd: u8,
        width: u32,
        components: u8,
        signed: bool,
    },

    /// An unrecognized control opcode before any attribute data.
    ///
    /// After data has been consumed the same condition is an expected
    /// end-of-stream, not an error.
    #[error("unknown control opcode {cmd:#04x} at {offset:#x} before any attribute data")]
    UnknownOpcode { offset: usize, cmd: u8 },

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// I/O error while writing artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, Error>;
