//! Common utilities for Veles.
//!
//! This crate provides the foundational types used across all Veles crates:
//!
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices
//! - [`fixed`] - 12.4 fixed-point conversion used by the vertex stream format
//! - Shared error types for low-level reads

mod error;
mod reader;

pub mod fixed;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
