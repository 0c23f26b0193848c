//! Veles - console game archive extraction library.
//!
//! This crate provides a unified interface to the Veles library ecosystem
//! for working with console game archives.
//!
//! # Crates
//!
//! - [`veles_common`] - Common utilities (binary reading, fixed point)
//! - [`veles_wad`] - WAD archive trees and the extraction driver
//! - [`veles_mesh`] - Mesh decoding and OBJ export
//! - [`veles_mat`] - Material resources
//! - [`veles_txr`] - Texture and raster resources
//! - [`veles_skel`] - Skeleton resources
//! - [`veles_pack`] - Multi-volume pack store
//!
//! # Example
//!
//! ```no_run
//! use veles::prelude::*;
//!
//! let data = std::fs::read("level.wad")?;
//! let mut wad = Wad::parse(&data, None)?;
//!
//! let registry = veles::default_registry();
//! let driver = Driver::new(&registry, ExtractOptions::new("out"));
//! let summary = driver.run(&mut wad);
//! println!("extracted {} node(s)", summary.extracted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use veles_common as common;
pub use veles_mat as mat;
pub use veles_mesh as mesh;
pub use veles_pack as pack;
pub use veles_skel as skel;
pub use veles_txr as txr;
pub use veles_wad as wad;

use veles_wad::ExtractorRegistry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veles_common::BinaryReader;
    pub use veles_mat::{Material, MaterialExtractor};
    pub use veles_mesh::{Mesh, MeshExtractor};
    pub use veles_pack::{parse_toc, TocEntry, TocGeneration, VolumeSet};
    pub use veles_skel::{Skeleton, SkeletonExtractor};
    pub use veles_txr::{Raster, RasterExtractor, Texture, TextureExtractor};
    pub use veles_wad::{
        Driver, ExtractOptions, ExtractorRegistry, Generation, Wad, WadNode,
    };
}

/// Registry with every built-in resource extractor wired in.
pub fn default_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(veles_txr::GFX_MAGIC, Box::new(veles_txr::RasterExtractor));
    registry.register(veles_txr::TXR_MAGIC, Box::new(veles_txr::TextureExtractor));
    registry.register(veles_mat::MAT_MAGIC, Box::new(veles_mat::MaterialExtractor));
    registry.register(veles_mesh::MESH_MAGIC, Box::new(veles_mesh::MeshExtractor));
    registry.register(veles_mesh::MESH_MAGIC_ROWS, Box::new(veles_mesh::MeshExtractor));
    registry.register(veles_skel::SKEL_MAGIC, Box::new(veles_skel::SkeletonExtractor));
    registry
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
