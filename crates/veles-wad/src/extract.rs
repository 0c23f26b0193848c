//! Extractor registry and dependency driver.
//!
//! Each payload format registers a decoder capability keyed by its format
//! tag. The registry is assembled once before the extraction pass and never
//! mutated afterwards; the driver walks the tree pre-order and invokes the
//! matching extractor per data node. Ordering between dependent siblings
//! (rasters before textures before materials before meshes) is carried by
//! the archive itself; a decoder that needs a not-yet-extracted sibling
//! fails with [`Error::DependencyNotReady`] instead of forcing reordering.

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::tree::{NodeId, Wad, WadNode};
use crate::{BoxError, Error, Result};

/// Result of a successful per-node extraction.
pub struct Extracted {
    /// Decoded representation kept on the node for dependent siblings.
    pub cache: Option<Box<dyn Any>>,
    /// Paths of artifacts written, relative to the output root.
    pub artifacts: Vec<String>,
}

/// A decoder capability for one payload format.
pub trait Extractor {
    /// Decode one node and optionally write artifacts.
    ///
    /// The context exposes the node's payload, scoped lookup into the tree
    /// and the artifact path hint.
    fn extract(&self, ctx: &ExtractContext<'_, '_>) -> std::result::Result<Extracted, BoxError>;
}

/// Immutable mapping from payload format tag to extractor.
///
/// Built once at startup and passed to the driver by reference.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<u32, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor for a format tag, replacing any previous one.
    pub fn register(&mut self, format: u32, extractor: Box<dyn Extractor>) {
        self.extractors.insert(format, extractor);
    }

    /// Look up the extractor for a format tag.
    pub fn get(&self, format: u32) -> Option<&dyn Extractor> {
        self.extractors.get(&format).map(|e| e.as_ref())
    }
}

/// Options controlling one extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Root directory artifacts are written under.
    pub out_dir: PathBuf,
    /// Also dump each handled node's raw payload next to its artifacts.
    pub dump_raw: bool,
}

impl ExtractOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            dump_raw: false,
        }
    }
}

/// Per-node view handed to an extractor.
pub struct ExtractContext<'w, 'a> {
    wad: &'w Wad<'a>,
    node: NodeId,
    out_path: PathBuf,
}

impl<'w, 'a> ExtractContext<'w, 'a> {
    /// The archive being extracted.
    #[inline]
    pub fn wad(&self) -> &'w Wad<'a> {
        self.wad
    }

    /// The node being extracted.
    #[inline]
    pub fn node(&self) -> &'w WadNode {
        self.wad.node(self.node)
    }

    /// Payload bytes of the node being extracted.
    pub fn payload(&self) -> Result<&'a [u8]> {
        self.wad.payload(self.node)
    }

    /// Artifact path hint: output root joined with the node path, without
    /// an extension.
    #[inline]
    pub fn out_path(&self) -> &Path {
        &self.out_path
    }

    /// Scoped lookup by name from this node outward, links followed.
    pub fn find(&self, name: &str) -> Option<&'w WadNode> {
        self.wad
            .find_from(self.node, name)
            .map(|id| self.wad.node(id))
    }

    /// Fetch a named node's decoded cache, downcast to `T`.
    ///
    /// Fails with [`Error::DependencyNotReady`] when the node exists but has
    /// not been extracted (or cached a different type); archive order is
    /// supposed to have handled it already.
    pub fn require_cache<T: 'static>(&self, name: &str) -> Result<&'w T> {
        let node = self.find(name).ok_or_else(|| Error::DependencyNotReady {
            node: self.node().path.clone(),
            needs: name.to_string(),
        })?;
        self.cache_of(node)
    }

    /// Fetch an already-resolved node's decoded cache, downcast to `T`.
    pub fn cache_of<T: 'static>(&self, node: &'w WadNode) -> Result<&'w T> {
        node.data()
            .filter(|data| data.extracted)
            .and_then(|data| data.cache.as_deref())
            .and_then(|cache| cache.downcast_ref::<T>())
            .ok_or_else(|| Error::DependencyNotReady {
                node: self.node().path.clone(),
                needs: node.path.clone(),
            })
    }

    /// Fetch the first artifact name recorded for a named node.
    pub fn require_artifact(&self, name: &str) -> Result<&'w str> {
        let node = self.find(name).ok_or_else(|| Error::DependencyNotReady {
            node: self.node().path.clone(),
            needs: name.to_string(),
        })?;
        node.data()
            .filter(|data| data.extracted)
            .and_then(|data| data.artifacts.first())
            .map(String::as_str)
            .ok_or_else(|| Error::DependencyNotReady {
                node: self.node().path.clone(),
                needs: node.path.clone(),
            })
    }
}

/// Outcome of a whole extraction pass.
#[derive(Debug, Default)]
pub struct ExtractSummary {
    /// Number of nodes an extractor handled successfully.
    pub extracted: usize,
    /// Per-root failures: node path and the error that stopped that root.
    pub failures: Vec<(String, Error)>,
}

/// Walks the tree and runs extractors.
pub struct Driver<'r> {
    registry: &'r ExtractorRegistry,
    options: ExtractOptions,
}

impl<'r> Driver<'r> {
    pub fn new(registry: &'r ExtractorRegistry, options: ExtractOptions) -> Self {
        Self { registry, options }
    }

    /// Run the extraction pass over every top-level root, pre-order.
    ///
    /// An error inside one root abandons the rest of that root and moves on
    /// to the next; artifacts already written stay on disk. Structural
    /// errors cannot occur here - the tree is already built.
    pub fn run(&self, wad: &mut Wad<'_>) -> ExtractSummary {
        let mut summary = ExtractSummary::default();
        for i in 0..wad.roots().len() {
            let root = wad.roots()[i];
            if let Err(err) = self.extract_subtree(wad, root, &mut summary) {
                let path = wad.node(root).path.clone();
                warn!("extraction of root '{path}' aborted: {err}");
                summary.failures.push((path, err));
            }
        }
        summary
    }

    /// Pre-order: the node itself, then its children in archive order.
    fn extract_subtree(
        &self,
        wad: &mut Wad<'_>,
        id: NodeId,
        summary: &mut ExtractSummary,
    ) -> Result<()> {
        self.extract_node(wad, id, summary)?;
        for i in 0..wad.node(id).children.len() {
            let child = wad.node(id).children[i];
            self.extract_subtree(wad, child, summary)?;
        }
        Ok(())
    }

    fn extract_node(
        &self,
        wad: &mut Wad<'_>,
        id: NodeId,
        summary: &mut ExtractSummary,
    ) -> Result<()> {
        let node = wad.node(id);
        let Some(data) = node.data() else {
            return Ok(());
        };
        if data.extracted {
            return Ok(());
        }
        let Some(extractor) = self.registry.get(data.format) else {
            return Ok(());
        };

        let out_path = self.options.out_dir.join(node.path.replace(':', "-"));
        debug!(
            "extracting '{}' format {:#x} size {:#x}",
            node.path, data.format, data.size
        );

        if self.options.dump_raw {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(out_path.with_extension("dump"), wad.payload(id)?)?;
        }

        let ctx = ExtractContext {
            wad,
            node: id,
            out_path,
        };
        let extracted = extractor.extract(&ctx).map_err(|source| Error::Extractor {
            path: wad.node(id).path.clone(),
            source,
        })?;

        let data = wad
            .node_mut(id)
            .data_mut()
            .expect("node kind checked above");
        data.cache = extracted.cache;
        data.artifacts = extracted.artifacts;
        data.extracted = true;
        summary.extracted += 1;
        Ok(())
    }
}
