//! Error types for WAD parsing and extraction.

use thiserror::Error;

/// Boxed error returned by format extractors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when working with WAD archives.
#[derive(Debug, Error)]
pub enum Error {
    /// The first frame tag matches no known container generation.
    #[error("cannot detect container generation: first tag {0:#x} is unknown")]
    UnknownGeneration(u32),

    /// Buffer ended inside a frame.
    #[error("truncated frame at {offset:#x}: needed {needed} bytes but only {available} available")]
    TruncatedFrame {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A record's declared payload extends past the end of the archive.
    #[error("truncated payload at {offset:#x}: declared {declared} bytes but only {available} available")]
    TruncatedPayload {
        offset: usize,
        declared: u32,
        available: usize,
    },

    /// A group-end record appeared with no group open.
    #[error("group end at {offset:#x} without matching group start")]
    UnbalancedGroup { offset: usize },

    /// A payload operation was attempted on a link node.
    #[error("'{path}' is a link node, not a data node")]
    NotADataNode { path: String },

    /// A link record's target exists in no reachable scope.
    #[error("unresolved link to '{name}' at {offset:#x}")]
    UnresolvedLink { name: String, offset: usize },

    /// A decoder needed a sibling resource that has not been extracted yet.
    ///
    /// Sibling order in the archive is assumed to satisfy dependencies, so
    /// this is a hard failure rather than a wait condition.
    #[error("'{node}' depends on '{needs}', which is not extracted yet")]
    DependencyNotReady { node: String, needs: String },

    /// A format extractor failed on one node.
    #[error("extraction of '{path}' failed: {source}")]
    Extractor {
        path: String,
        #[source]
        source: BoxError,
    },

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for WAD operations.
pub type Result<T> = std::result::Result<T, Error>;
