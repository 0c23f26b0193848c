//! Archive tree construction and scoped lookup.
//!
//! The frame stream encodes a file tree implicitly: group-start markers arm
//! a flag, the next payload record becomes the group node, group-end markers
//! pop it. Zero-size payload records are links that alias an already-defined
//! data node by name.
//!
//! Nodes live in an arena owned by [`Wad`] and reference each other through
//! [`NodeId`]s, so parent back-edges and link targets never create ownership
//! cycles: the ownership graph stays a strict forest.

use std::any::Any;
use std::fmt::Write as _;

use veles_common::BinaryReader;

use crate::frame::{FrameReader, Generation, RecordKind};
use crate::{Error, Result};

/// Index of a node in the archive's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload-carrying state of a data node.
#[derive(Debug)]
pub struct DataNode {
    /// Format tag from the first 4 bytes of the payload.
    pub format: u32,
    /// Declared payload size in bytes.
    pub size: u32,
    /// Absolute offset of the payload within the archive.
    pub payload_offset: usize,
    /// Set once by the extraction driver.
    pub extracted: bool,
    /// Decoded representation stored by the node's extractor, consumed by
    /// dependent siblings (e.g. a mesh reading its material).
    pub cache: Option<Box<dyn Any>>,
    /// Paths of artifacts written for this node, relative to the output root.
    pub artifacts: Vec<String>,
}

/// What a node is: a payload-carrying resource or an alias to one.
#[derive(Debug)]
pub enum NodeKind {
    Data(DataNode),
    /// A link never owns its target; it aliases a data node by name.
    Link { target: NodeId },
}

/// One resource in the archive tree.
#[derive(Debug)]
pub struct WadNode {
    pub id: NodeId,
    /// Record name; can be empty for anonymous records.
    pub name: String,
    /// Slash-joined ancestor names.
    pub path: String,
    /// Nesting depth (root nodes are 0).
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// Owned children in archive order.
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl WadNode {
    /// Data-node state, if this is a data node.
    #[inline]
    pub fn data(&self) -> Option<&DataNode> {
        match &self.kind {
            NodeKind::Data(data) => Some(data),
            NodeKind::Link { .. } => None,
        }
    }

    /// Mutable data-node state.
    #[inline]
    pub fn data_mut(&mut self) -> Option<&mut DataNode> {
        match &mut self.kind {
            NodeKind::Data(data) => Some(data),
            NodeKind::Link { .. } => None,
        }
    }
}

/// A parsed WAD archive: the node arena plus a borrowed view of the bytes.
///
/// The tree is built once and is read-only afterwards, except for the
/// per-node extraction state which the driver sets exactly once.
pub struct Wad<'a> {
    data: &'a [u8],
    generation: Generation,
    nodes: Vec<WadNode>,
    roots: Vec<NodeId>,
}

impl<'a> Wad<'a> {
    /// Parse the whole archive into a tree.
    ///
    /// Single pass over the frame stream; construction failure returns no
    /// partial tree. `generation` is auto-detected when `None`.
    pub fn parse(data: &'a [u8], generation: Option<Generation>) -> Result<Self> {
        let mut frames = FrameReader::new(data, generation)?;
        let mut wad = Self {
            data,
            generation: frames.generation(),
            nodes: Vec::new(),
            roots: Vec::new(),
        };

        // Stack of open group nodes; empty means root scope.
        let mut stack: Vec<NodeId> = Vec::new();
        let mut group_pending = false;

        while let Some(frame) = frames.next_frame()? {
            match frame.kind {
                RecordKind::GroupStart => group_pending = true,
                RecordKind::GroupEnd => {
                    group_pending = false;
                    if stack.pop().is_none() {
                        return Err(Error::UnbalancedGroup {
                            offset: frame.offset,
                        });
                    }
                }
                RecordKind::Payload => {
                    let parent = stack.last().copied();
                    let kind = if frame.size == 0 {
                        let target = wad
                            .resolve_link_target(&stack, &frame.name)
                            .ok_or_else(|| Error::UnresolvedLink {
                                name: frame.name.clone(),
                                offset: frame.offset,
                            })?;
                        NodeKind::Link { target }
                    } else {
                        let available = data.len().saturating_sub(frame.payload_offset);
                        if (frame.size as usize) > available || frame.size < 4 {
                            return Err(Error::TruncatedPayload {
                                offset: frame.payload_offset,
                                declared: frame.size,
                                available,
                            });
                        }
                        let format =
                            BinaryReader::new_at(data, frame.payload_offset).read_u32()?;
                        NodeKind::Data(DataNode {
                            format,
                            size: frame.size,
                            payload_offset: frame.payload_offset,
                            extracted: false,
                            cache: None,
                            artifacts: Vec::new(),
                        })
                    };

                    let id = wad.push_node(parent, frame.name, kind);
                    if group_pending {
                        group_pending = false;
                        stack.push(id);
                    }
                }
                RecordKind::Ignorable | RecordKind::EntityCount => {}
            }
        }

        Ok(wad)
    }

    /// Append a node to the arena under `parent` (or as a root).
    fn push_node(&mut self, parent: Option<NodeId>, name: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let (path, depth) = match parent {
            Some(parent_id) => {
                let parent_node = self.node(parent_id);
                (
                    format!("{}/{}", parent_node.path, name),
                    parent_node.depth + 1,
                )
            }
            None => (name.clone(), 0),
        };
        self.nodes.push(WadNode {
            id,
            name,
            path,
            depth,
            parent,
            children: Vec::new(),
            kind,
        });
        match parent {
            Some(parent_id) => self.nodes[parent_id.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Scoped lookup for link resolution during the build.
    ///
    /// Nearest scope wins: the current group's already-seen children, then
    /// each ancestor's children walking outward, then the top-level nodes.
    /// Only data nodes can be link targets.
    fn resolve_link_target(&self, stack: &[NodeId], name: &str) -> Option<NodeId> {
        for scope in stack.iter().rev() {
            if let Some(found) = self.find_data_child(*scope, name) {
                return Some(found);
            }
        }
        self.roots
            .iter()
            .copied()
            .find(|&id| self.node(id).data().is_some() && self.node(id).name == name)
    }

    fn find_data_child(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        self.node(scope)
            .children
            .iter()
            .copied()
            .find(|&id| self.node(id).data().is_some() && self.node(id).name == name)
    }

    /// The archive generation.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The raw archive bytes.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Top-level nodes in archive order.
    #[inline]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes in the arena.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a node by id.
    #[inline]
    pub fn node(&self, id: NodeId) -> &WadNode {
        &self.nodes[id.0]
    }

    /// Mutable node access (used by the extraction driver).
    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut WadNode {
        &mut self.nodes[id.0]
    }

    /// Follow a link to its data node; data nodes resolve to themselves.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        match self.node(id).kind {
            NodeKind::Link { target } => target,
            NodeKind::Data(_) => id,
        }
    }

    /// Scoped lookup by name starting at `from`: the node's own children,
    /// then each ancestor's children, then the top-level nodes. Links match
    /// and are followed.
    pub fn find_from(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let mut scope = Some(from);
        while let Some(scope_id) = scope {
            let node = self.node(scope_id);
            if let Some(found) = node
                .children
                .iter()
                .copied()
                .find(|&id| self.node(id).name == name)
            {
                return Some(self.resolve(found));
            }
            scope = node.parent;
        }
        self.roots
            .iter()
            .copied()
            .find(|&id| self.node(id).name == name)
            .map(|id| self.resolve(id))
    }

    /// Payload bytes of a data node.
    pub fn payload(&self, id: NodeId) -> Result<&'a [u8]> {
        let node = self.node(id);
        let data = node.data().ok_or_else(|| Error::NotADataNode {
            path: node.path.clone(),
        })?;
        let start = data.payload_offset;
        let end = start + data.size as usize;
        // Bounds were validated at parse time.
        Ok(&self.data[start..end])
    }

    /// User-friendly tree representation, one node per line.
    pub fn format_tree(&self) -> String {
        let mut out = String::new();
        for &root in &self.roots {
            self.format_node(&mut out, root, 0);
        }
        out
    }

    fn format_node(&self, out: &mut String, id: NodeId, indent: usize) {
        let node = self.node(id);
        let prefix = "  ".repeat(indent);
        match &node.kind {
            NodeKind::Data(data) => {
                let _ = writeln!(
                    out,
                    "{prefix}data size: {:#08x} format: {:#010x} start: {:#010x} '{}'",
                    data.size, data.format, data.payload_offset, node.name
                );
                for &child in &node.children {
                    self.format_node(out, child, indent + 1);
                }
            }
            NodeKind::Link { target } => {
                let _ = writeln!(
                    out,
                    "{prefix}link '{}' -> '{}'",
                    node.name,
                    self.node(*target).path
                );
            }
        }
    }
}

impl std::fmt::Debug for Wad<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wad")
            .field("generation", &self.generation)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots.len())
            .finish()
    }
}
