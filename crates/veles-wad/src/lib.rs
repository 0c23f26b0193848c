//! Tag-framed WAD archive reader.
//!
//! WAD containers store a forest of named, typed resources as a flat stream
//! of fixed-size frames. Group markers encode the tree implicitly and
//! zero-size records are links resolved by scope-aware name lookup. This
//! crate covers:
//!
//! - [`frame`] - frame decoding and generation detection
//! - [`tree`] - single-pass tree construction with link resolution
//! - [`extract`] - the format-tag extractor registry and the dependency
//!   driver that walks the tree
//!
//! # Example
//!
//! ```no_run
//! use veles_wad::{Driver, ExtractOptions, ExtractorRegistry, Wad};
//!
//! let bytes = std::fs::read("LEVEL.WAD")?;
//! let mut wad = Wad::parse(&bytes, None)?;
//! print!("{}", wad.format_tree());
//!
//! let registry = ExtractorRegistry::new();
//! let summary = Driver::new(&registry, ExtractOptions::new("out")).run(&mut wad);
//! println!("{} extracted, {} failed roots", summary.extracted, summary.failures.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
pub mod extract;
pub mod frame;
pub mod tree;

#[cfg(test)]
mod testutil;

pub use error::{BoxError, Error, Result};
pub use extract::{
    Driver, ExtractContext, ExtractOptions, ExtractSummary, Extracted, Extractor,
    ExtractorRegistry,
};
pub use frame::{Frame, FrameReader, Generation, RecordKind};
pub use tree::{DataNode, NodeId, NodeKind, Wad, WadNode};
