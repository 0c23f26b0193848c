//! Multi-volume pack store and table-of-contents parsing.

mod error;
pub mod toc;
pub mod volume;

pub use error::{Error, Result};
pub use toc::{parse_toc, TocEntry, TocGeneration, SECTOR_SIZE};
pub use volume::VolumeSet;
