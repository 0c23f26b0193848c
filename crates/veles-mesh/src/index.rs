//! Structural index over a mesh resource.
//!
//! A mesh resource is a pointer soup: a part table at a fixed offset, each
//! part pointing at groups, each group at objects, each object at attribute
//! packets. The older revision (`0x1000F`) stores packet start offsets but
//! no lengths, so packet extents are inferred by walking every structure
//! strictly last-to-first with a running end cursor. The newer revision
//! (`0x2000F`) stores a row count per packet; the reverse walk is kept but
//! the extents come straight from the table.

use std::ops::Range;

use tracing::trace;
use veles_common::BinaryReader;

use crate::vif::{self, AttributeBlock};
use crate::{Error, Result};

/// Format tag of the length-less mesh revision.
pub const MESH_MAGIC: u32 = 0x0001_000F;
/// Format tag of the revision carrying per-packet row counts.
pub const MESH_MAGIC_ROWS: u32 = 0x0002_000F;

/// Offset of the part pointer table.
const PART_TABLE: usize = 0x50;

/// Object types whose packets carry vertex attribute streams.
const GEOMETRY_TYPES: [u16; 3] = [0xE, 0x1D, 0x24];

#[derive(Debug)]
pub struct Object {
    pub type_tag: u16,
    pub material_id: u8,
    /// Decoded vertex blocks, in archive order.
    pub blocks: Vec<AttributeBlock>,
}

#[derive(Debug)]
pub struct Group {
    pub objects: Vec<Object>,
}

#[derive(Debug)]
pub struct Part {
    pub groups: Vec<Group>,
}

/// A fully decoded mesh resource.
#[derive(Debug)]
pub struct Mesh {
    pub parts: Vec<Part>,
}

fn u8_at(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset)
        .copied()
        .ok_or(Error::Truncated { offset, len: data.len() })
}

fn u16_at(data: &[u8], offset: usize) -> Result<u16> {
    BinaryReader::new_at(data, offset)
        .read_u16()
        .map_err(|_| Error::Truncated { offset, len: data.len() })
}

fn u32_at(data: &[u8], offset: usize) -> Result<u32> {
    BinaryReader::new_at(data, offset)
        .read_u32()
        .map_err(|_| Error::Truncated { offset, len: data.len() })
}

/// Assign a byte range to each packet, walking last to first.
///
/// `pointer_end` enters as the end of the last packet and leaves as the
/// start of the first. With `rows` present each extent is explicit; without
/// it a packet ends where its successor starts. Ranges come out in table
/// order. A start at or past the current end yields an empty range.
fn infer_packet_ranges(
    starts: &[usize],
    rows: Option<&[usize]>,
    pointer_end: &mut usize,
) -> Vec<Range<usize>> {
    let mut ranges = vec![0..0; starts.len()];
    for (i, &start) in starts.iter().enumerate().rev() {
        let end = match rows {
            Some(rows) => start + rows[i] * 16,
            None => *pointer_end,
        };
        ranges[i] = if start < end { start..end } else { start..start };
        *pointer_end = start;
    }
    ranges
}

impl Mesh {
    /// Decode a whole mesh resource.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let magic = u32_at(data, 0)?;
        if magic != MESH_MAGIC && magic != MESH_MAGIC_ROWS {
            return Err(Error::BadMagic(magic));
        }
        let has_rows = magic == MESH_MAGIC_ROWS;

        let comment_start = (u32_at(data, 4)? as usize).min(data.len());
        let part_count = u32_at(data, 8)? as usize;
        trace!("mesh: {part_count} parts, data ends at {comment_start:#x}");

        // Everything below comment-start is packet data or structure; the
        // cursor tracks the lowest byte not yet claimed by a later packet.
        let mut pointer_end = comment_start;

        let mut parts = Vec::with_capacity(part_count);
        for i in (0..part_count).rev() {
            let part_offset = u32_at(data, PART_TABLE + i * 4)? as usize;
            parts.push(Self::decode_part(data, part_offset, has_rows, &mut pointer_end)?);
            pointer_end = part_offset;
        }
        parts.reverse();

        Ok(Mesh { parts })
    }

    fn decode_part(
        data: &[u8],
        part_offset: usize,
        has_rows: bool,
        pointer_end: &mut usize,
    ) -> Result<Part> {
        let group_count = u16_at(data, part_offset + 2)? as usize;

        let mut groups = Vec::with_capacity(group_count);
        for i in (0..group_count).rev() {
            let rel = u32_at(data, part_offset + 4 + i * 4)? as usize;
            let group_offset = part_offset + rel;
            groups.push(Self::decode_group(data, group_offset, has_rows, pointer_end)?);
            *pointer_end = group_offset;
        }
        groups.reverse();

        Ok(Part { groups })
    }

    fn decode_group(
        data: &[u8],
        group_offset: usize,
        has_rows: bool,
        pointer_end: &mut usize,
    ) -> Result<Group> {
        let object_count = u32_at(data, group_offset + 4)? as usize;

        let mut objects = Vec::with_capacity(object_count);
        for i in (0..object_count).rev() {
            let rel = u32_at(data, group_offset + 0xC + i * 4)? as usize;
            let object_offset = group_offset + rel;
            objects.push(Self::decode_object(data, object_offset, has_rows, pointer_end)?);
            *pointer_end = object_offset;
        }
        objects.reverse();

        Ok(Group { objects })
    }

    fn decode_object(
        data: &[u8],
        object_offset: usize,
        has_rows: bool,
        pointer_end: &mut usize,
    ) -> Result<Object> {
        let type_tag = u16_at(data, object_offset)?;
        let material_id = u8_at(data, object_offset + 8)?;

        if !GEOMETRY_TYPES.contains(&type_tag) {
            trace!("object at {object_offset:#x}: type {type_tag:#x} carries no geometry");
            return Ok(Object {
                type_tag,
                material_id,
                blocks: Vec::new(),
            });
        }

        let packet_count = u32_at(data, object_offset + 0xC)? as usize
            * u8_at(data, object_offset + 0x18)? as usize;

        let mut starts = Vec::with_capacity(packet_count);
        let mut rows = has_rows.then(|| Vec::with_capacity(packet_count));
        for i in 0..packet_count {
            let info = object_offset + 0x20 + i * 16;
            starts.push(object_offset + u32_at(data, info + 4)? as usize);
            if let Some(rows) = rows.as_mut() {
                rows.push(u32_at(data, info)? as usize);
            }
        }

        let ranges = infer_packet_ranges(&starts, rows.as_deref(), pointer_end);

        // Packets were ranged in reverse but decode cleanly in either
        // direction; keep table order for the output.
        let mut blocks = Vec::new();
        for range in ranges {
            if range.is_empty() {
                continue;
            }
            if range.end > data.len() {
                return Err(Error::Truncated {
                    offset: range.start,
                    len: data.len(),
                });
            }
            let start = range.start;
            blocks.extend(vif::decode_stream(&data[range], start)?);
        }

        Ok(Object {
            type_tag,
            material_id,
            blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vif::tests::{push_flush, push_positions};

    fn put_u32(data: &mut [u8], offset: usize, value: u32) {
        data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u16(data: &mut [u8], offset: usize, value: u16) {
        data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn test_reverse_boundary_inference() {
        let mut pointer_end = 400;
        let ranges = infer_packet_ranges(&[100, 180, 260], None, &mut pointer_end);
        assert_eq!(ranges, vec![100..180, 180..260, 260..400]);
        assert_eq!(pointer_end, 100);
    }

    #[test]
    fn test_explicit_row_counts_ignore_cursor() {
        let mut pointer_end = 400;
        let ranges = infer_packet_ranges(&[100, 260], Some(&[4, 2]), &mut pointer_end);
        assert_eq!(ranges, vec![100..164, 260..292]);
        assert_eq!(pointer_end, 100);
    }

    #[test]
    fn test_start_at_cursor_yields_empty_range() {
        let mut pointer_end = 200;
        let ranges = infer_packet_ranges(&[200], None, &mut pointer_end);
        assert!(ranges[0].is_empty());
    }

    /// Without the inferred boundary, packet 0 decoded forward would run
    /// straight into packet 1's position run and fail.
    #[test]
    fn test_forward_decode_without_boundary_bleeds_into_next_packet() {
        let mut data = vec![0u8; 416];

        let mut packet0 = Vec::new();
        push_positions(&mut packet0, &[(1.0, 0.0, 0.0, true)]);
        data[100..100 + packet0.len()].copy_from_slice(&packet0);

        let mut packet1 = Vec::new();
        push_positions(&mut packet1, &[(2.0, 0.0, 0.0, true)]);
        data[180..180 + packet1.len()].copy_from_slice(&packet1);

        // Correct boundary: exactly packet 0's vertex.
        let blocks = vif::decode_stream(&data[100..180], 100).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].positions.len(), 1);
        assert_eq!(blocks[0].positions[0].x, 1.0);

        // Boundary too far: the second position run collides with the
        // still-pending first one.
        assert!(matches!(
            vif::decode_stream(&data[100..260], 100),
            Err(Error::DuplicateAttribute { .. })
        ));
    }

    /// Build a one-part, one-group, one-object mesh with `packets` placed
    /// at the given absolute offsets.
    fn synthetic_mesh(magic: u32, packets: &[(usize, Vec<u8>)], comment_start: usize) -> Vec<u8> {
        let part = 0x58;
        let group = 0x68;
        let object = 0x80;

        let mut data = vec![0u8; comment_start.max(0x200) + 16];
        put_u32(&mut data, 0, magic);
        put_u32(&mut data, 4, comment_start as u32);
        put_u32(&mut data, 8, 1); // part count
        put_u32(&mut data, PART_TABLE, part as u32);

        put_u16(&mut data, part + 2, 1); // group count
        put_u32(&mut data, part + 4, (group - part) as u32);

        put_u32(&mut data, group + 4, 1); // object count
        put_u32(&mut data, group + 0xC, (object - group) as u32);

        put_u16(&mut data, object, 0xE);
        data[object + 8] = 3; // material id
        put_u32(&mut data, object + 0xC, packets.len() as u32);
        data[object + 0x18] = 1;
        for (i, (start, payload)) in packets.iter().enumerate() {
            let info = object + 0x20 + i * 16;
            put_u32(&mut data, info, (payload.len() / 16) as u32);
            put_u32(&mut data, info + 4, (start - object) as u32);
            data[*start..start + payload.len()].copy_from_slice(payload);
        }
        data
    }

    fn packet_of(verts: &[(f32, f32, f32, bool)]) -> Vec<u8> {
        let mut packet = Vec::new();
        push_positions(&mut packet, verts);
        push_flush(&mut packet);
        while packet.len() % 16 != 0 {
            packet.push(0);
        }
        packet
    }

    #[test]
    fn test_decode_inferred_extents() {
        let p0 = packet_of(&[(1.0, 0.0, 0.0, true), (0.0, 1.0, 0.0, false)]);
        let p1 = packet_of(&[(2.0, 0.0, 0.0, true)]);
        let p1_end = 0x140 + p1.len();
        let data = synthetic_mesh(MESH_MAGIC, &[(0x100, p0), (0x140, p1)], p1_end);

        let mesh = Mesh::decode(&data).unwrap();
        assert_eq!(mesh.parts.len(), 1);
        let object = &mesh.parts[0].groups[0].objects[0];
        assert_eq!(object.type_tag, 0xE);
        assert_eq!(object.material_id, 3);
        // One block per packet, back in table order.
        assert_eq!(object.blocks.len(), 2);
        assert_eq!(object.blocks[0].positions.len(), 2);
        assert_eq!(object.blocks[0].positions[0].x, 1.0);
        assert_eq!(object.blocks[1].positions[0].x, 2.0);
    }

    #[test]
    fn test_decode_row_count_revision() {
        let p0 = packet_of(&[(1.0, 2.0, 3.0, true)]);
        let p0_end = 0x100 + p0.len();
        let data = synthetic_mesh(MESH_MAGIC_ROWS, &[(0x100, p0)], p0_end);

        let mesh = Mesh::decode(&data).unwrap();
        let object = &mesh.parts[0].groups[0].objects[0];
        assert_eq!(object.blocks.len(), 1);
        assert_eq!(object.blocks[0].positions[0].z, 3.0);
    }

    #[test]
    fn test_bad_magic() {
        let data = [0xAAu8; 0x60];
        assert!(matches!(Mesh::decode(&data), Err(Error::BadMagic(_))));
    }

    #[test]
    fn test_non_geometry_object_indexes_no_packets() {
        // Type 0x2C: header fields past +8 never read, no packets decoded.
        let p0 = packet_of(&[(1.0, 0.0, 0.0, true)]);
        let mut data = synthetic_mesh(MESH_MAGIC, &[(0x100, p0)], 0x140);
        put_u16(&mut data, 0x80, 0x2C);

        let mesh = Mesh::decode(&data).unwrap();
        let object = &mesh.parts[0].groups[0].objects[0];
        assert_eq!(object.type_tag, 0x2C);
        assert!(object.blocks.is_empty());
    }

    #[test]
    fn test_truncated_part_table() {
        let mut data = vec![0u8; 0x52];
        put_u32(&mut data, 0, MESH_MAGIC);
        put_u32(&mut data, 8, 1);
        assert!(matches!(
            Mesh::decode(&data),
            Err(Error::Truncated { offset: PART_TABLE, .. })
        ));
    }
}
