//! Wavefront OBJ/MTL serialization of a decoded mesh.

use std::io::Write;

use crate::index::Mesh;
use crate::Result;

/// One entry of the generated material library.
#[derive(Debug, Clone)]
pub struct ObjMaterial {
    pub name: String,
    pub color: [f32; 4],
    /// Diffuse texture path, relative to the OBJ file.
    pub texture: Option<String>,
}

/// Write the material library referenced by [`write_obj`].
pub fn write_mtl<W: Write>(out: &mut W, materials: &[ObjMaterial]) -> Result<()> {
    for material in materials {
        writeln!(out, "newmtl {}", material.name)?;
        let [r, g, b, a] = material.color;
        writeln!(out, "Kd {r} {g} {b}")?;
        writeln!(out, "d {a}")?;
        if let Some(texture) = &material.texture {
            writeln!(out, "map_Kd {texture}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write a decoded mesh as triangle lists.
///
/// Vertex blocks are triangle strips: every vertex whose strip flag is
/// clear closes a triangle with its two predecessors, with the winding
/// flipped on alternating vertices. The flip parity carries across blocks
/// within an object. Texture coordinates are emitted only for blocks whose
/// UV run covered every position, with `v` flipped to image orientation.
pub fn write_obj<W: Write>(out: &mut W, mesh: &Mesh, mtl_file: &str) -> Result<()> {
    writeln!(out, "mtllib {mtl_file}")?;

    // OBJ indices are 1-based and cumulative over the whole file.
    let mut vertex_base = 1usize;

    for (pi, part) in mesh.parts.iter().enumerate() {
        writeln!(out, "g part_{pi}")?;
        for (gi, group) in part.groups.iter().enumerate() {
            for (oi, object) in group.objects.iter().enumerate() {
                if object.blocks.is_empty() {
                    continue;
                }
                writeln!(out, "o part_{pi}_g{gi}_o{oi}")?;
                writeln!(out, "usemtl mat_{}", object.material_id)?;

                let mut swap = false;
                for block in &object.blocks {
                    let uvs = block
                        .uvs
                        .as_ref()
                        .filter(|uvs| uvs.len() == block.positions.len());
                    let textured = uvs.is_some();

                    for vertex in &block.positions {
                        writeln!(out, "v {} {} {}", vertex.x, vertex.y, vertex.z)?;
                    }
                    for uv in uvs.into_iter().flatten() {
                        writeln!(out, "vt {} {}", uv[0], 1.0 - uv[1])?;
                    }

                    for (i, vertex) in block.positions.iter().enumerate() {
                        if i >= 2 && !vertex.terminates_strip {
                            let (a, b) = if swap { (i - 1, i - 2) } else { (i - 2, i - 1) };
                            let (a, b, c) = (vertex_base + a, vertex_base + b, vertex_base + i);
                            if textured {
                                writeln!(out, "f {a}/{a} {b}/{b} {c}/{c}")?;
                            } else {
                                writeln!(out, "f {a} {b} {c}")?;
                            }
                        }
                        swap = !swap;
                    }
                    vertex_base += block.positions.len();
                }
            }
        }
    }
    Ok(())
}
