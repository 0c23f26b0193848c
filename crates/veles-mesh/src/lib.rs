//! Mesh resource decoding and OBJ export.
//!
//! A mesh resource is decoded in two stages: [`index::Mesh`] resolves the
//! part/group/object/packet structure, then [`vif`] decodes each packet's
//! attribute stream into vertex blocks. [`MeshExtractor`] ties both to the
//! archive driver, pulls material and texture dependencies from sibling
//! nodes and serializes the result as Wavefront OBJ/MTL.

mod error;
pub mod index;
pub mod obj;
pub mod vif;

use std::fs;
use std::io::{BufWriter, Write};

use tracing::debug;
use veles_mat::Material;
use veles_wad::{BoxError, ExtractContext, Extracted, Extractor};

pub use error::{Error, Result};
pub use index::{Mesh, MESH_MAGIC, MESH_MAGIC_ROWS};
pub use obj::ObjMaterial;
pub use vif::{AttributeBlock, StripVertex};

/// Extractor writing one OBJ/MTL pair per mesh node.
///
/// Materials come from the mesh's siblings in archive order, links
/// followed; each textured material layer is resolved through the texture
/// node's recorded artifact. A sibling that has not been extracted yet is a
/// dependency violation and fails the node.
pub struct MeshExtractor;

impl Extractor for MeshExtractor {
    fn extract(&self, ctx: &ExtractContext<'_, '_>) -> std::result::Result<Extracted, BoxError> {
        let mesh = Mesh::decode(ctx.payload()?)?;
        let node = ctx.node();
        let wad = ctx.wad();

        let siblings = match node.parent {
            Some(parent) => wad.node(parent).children.as_slice(),
            None => wad.roots(),
        };

        let mut materials = Vec::new();
        for &sibling in siblings {
            let resolved = wad.node(wad.resolve(sibling));
            if resolved.data().map_or(true, |d| d.format != veles_mat::MAT_MAGIC) {
                continue;
            }
            let material: &Material = ctx.cache_of(resolved)?;
            let texture = match material.primary_texture() {
                Some(name) => {
                    // Artifacts are recorded relative to the output root;
                    // the OBJ sits one directory deeper per tree level.
                    let artifact = ctx.require_artifact(name)?;
                    Some(format!("{}{artifact}", "../".repeat(node.depth)))
                }
                None => None,
            };
            materials.push(ObjMaterial {
                name: format!("mat_{}", materials.len()),
                color: material.color,
                texture,
            });
        }

        let obj_path = ctx.out_path().with_extension("obj");
        let mtl_path = ctx.out_path().with_extension("mtl");
        if let Some(dir) = obj_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mtl_file = mtl_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model.mtl".to_owned());

        let mut out = BufWriter::new(fs::File::create(&obj_path)?);
        obj::write_obj(&mut out, &mesh, &mtl_file)?;
        out.flush()?;

        let mut out = BufWriter::new(fs::File::create(&mtl_path)?);
        obj::write_mtl(&mut out, &materials)?;
        out.flush()?;

        let vertices: usize = mesh
            .parts
            .iter()
            .flat_map(|p| &p.groups)
            .flat_map(|g| &g.objects)
            .flat_map(|o| &o.blocks)
            .map(|b| b.positions.len())
            .sum();
        debug!(
            "mesh '{}': {} part(s), {vertices} vertices, {} material(s)",
            node.path,
            mesh.parts.len(),
            materials.len()
        );

        let stem = node.path.replace(':', "-");
        Ok(Extracted {
            cache: Some(Box::new(mesh)),
            artifacts: vec![format!("{stem}.obj"), format!("{stem}.mtl")],
        })
    }
}
