//! Skeleton resource parser.
//!
//! A skeleton carries the joint hierarchy a model animates with: named
//! joints with parent and child-range links, a bind-pose matrix per joint,
//! and inverse matrices for the subset of joints that carry one. The
//! extractor only caches the parsed skeleton; nothing is written to disk.

mod error;

use std::fmt::Write as _;

use tracing::debug;
use veles_common::BinaryReader;
use veles_wad::{BoxError, ExtractContext, Extracted, Extractor};

pub use error::{Error, Result};

/// Payload format tag of skeleton resources.
pub const SKEL_MAGIC: u32 = 0x0004_0001;

/// Size of the fixed skeleton header.
const HEADER_SIZE: usize = 0x2C;
/// Size of one joint record.
const JOINT_SIZE: usize = 0x10;
/// Size of one joint name buffer.
const NAME_SIZE: usize = 0x18;
/// Size of the pose-data header at the data offset.
const DATA_HEADER_SIZE: usize = 0x30;

/// Sentinel in the parent and child-range fields meaning "no joint".
pub const JOINT_NONE: u16 = 0xFFFF;

/// Flag bits marking a joint that owns an inverse matrix.
const INVERSE_FLAGS: u32 = 0xA0;

/// One joint of the hierarchy.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub flags: u32,
    /// First and last child joint index, or [`JOINT_NONE`] for a leaf.
    pub children_start: u16,
    pub children_end: u16,
    pub parent: Option<u16>,
    /// Index into [`Skeleton::inverse_matrices`] for flagged joints.
    pub inverse: Option<u16>,
}

/// A parsed skeleton resource.
///
/// The pose arrays are row-indexed by joint id, except
/// `inverse_matrices`, which only has rows for joints whose
/// [`Joint::inverse`] is set.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
    /// Per-joint bind-pose matrix, 4x4 row-major.
    pub bind_matrices: Vec<[f32; 16]>,
    /// Inverse bind matrices for flagged joints only.
    pub inverse_matrices: Vec<[f32; 16]>,
    /// Index rows following the bind matrices; meaning unidentified.
    pub index_rows: Vec<[u32; 4]>,
    /// Per-joint bind position, xyz plus a trailing word.
    pub bind_positions: Vec<[f32; 4]>,
    /// Per-joint integer rows; meaning unidentified.
    pub unknown5: Vec<[i32; 4]>,
    /// Per-joint bind scale.
    pub bind_scales: Vec<[f32; 4]>,
    /// Per-joint float rows; meaning unidentified.
    pub unknown7: Vec<[f32; 4]>,
}

fn read_mat4s(data: &[u8], offset: usize, count: usize) -> Result<Vec<[f32; 16]>> {
    let mut reader = BinaryReader::new_at(data, offset);
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let mut row = [0.0f32; 16];
        for cell in &mut row {
            *cell = reader.read_f32()?;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn read_f32_rows(data: &[u8], offset: usize, count: usize) -> Result<Vec<[f32; 4]>> {
    let mut reader = BinaryReader::new_at(data, offset);
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let mut row = [0.0f32; 4];
        for cell in &mut row {
            *cell = reader.read_f32()?;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn read_u32_rows(data: &[u8], offset: usize, count: usize) -> Result<Vec<[u32; 4]>> {
    let mut reader = BinaryReader::new_at(data, offset);
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let mut row = [0u32; 4];
        for cell in &mut row {
            *cell = reader.read_u32()?;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn read_i32_rows(data: &[u8], offset: usize, count: usize) -> Result<Vec<[i32; 4]>> {
    let mut reader = BinaryReader::new_at(data, offset);
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let mut row = [0i32; 4];
        for cell in &mut row {
            *cell = reader.read_i32()?;
        }
        rows.push(row);
    }
    Ok(rows)
}

impl Skeleton {
    /// Parse a skeleton from its payload bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        let magic = reader.read_u32()?;
        if magic != SKEL_MAGIC {
            return Err(Error::BadMagic(magic));
        }

        reader.seek(0x1C);
        let joint_count = reader.read_u32()? as usize;
        reader.seek(0x28);
        let data_offset = reader.read_u32()? as usize;

        let names_offset = HEADER_SIZE + joint_count * JOINT_SIZE;
        let mut joints = Vec::with_capacity(joint_count);
        let mut inverse_count = 0u16;
        for i in 0..joint_count {
            let mut record = BinaryReader::new_at(data, HEADER_SIZE + i * JOINT_SIZE);
            let flags = record.read_u32()?;
            let children_start = record.read_u16()?;
            let children_end = record.read_u16()?;
            let parent = record.read_u16()?;

            let mut name = BinaryReader::new_at(data, names_offset + i * NAME_SIZE);
            let name = name.read_string_in_buffer(NAME_SIZE)?;

            let inverse = (flags & INVERSE_FLAGS == INVERSE_FLAGS).then(|| {
                let id = inverse_count;
                inverse_count += 1;
                id
            });
            joints.push(Joint {
                name: name.to_owned(),
                flags,
                children_start,
                children_end,
                parent: (parent != JOINT_NONE).then_some(parent),
                inverse,
            });
        }

        let mut header = BinaryReader::new_at(data, data_offset);
        let bind_count = header.read_u32()? as usize;
        let rows_offset = header.read_u32()? as usize;
        // A count field of zero still ships one row.
        let rows_count = header.read_u32()? as usize + 1;
        let inverse_offset = header.read_u32()? as usize;
        let inverse_mat_count = header.read_u32()? as usize;
        header.advance(12);
        let positions_offset = header.read_u32()? as usize;
        let ints_offset = header.read_u32()? as usize;
        let scales_offset = header.read_u32()? as usize;
        let floats_offset = header.read_u32()? as usize;

        Ok(Self {
            joints,
            bind_matrices: read_mat4s(data, data_offset + DATA_HEADER_SIZE, bind_count)?,
            inverse_matrices: read_mat4s(data, data_offset + inverse_offset, inverse_mat_count)?,
            index_rows: read_u32_rows(data, data_offset + rows_offset, rows_count)?,
            bind_positions: read_f32_rows(data, data_offset + positions_offset, bind_count)?,
            unknown5: read_i32_rows(data, data_offset + ints_offset, bind_count)?,
            bind_scales: read_f32_rows(data, data_offset + scales_offset, bind_count)?,
            unknown7: read_f32_rows(data, data_offset + floats_offset, bind_count)?,
        })
    }

    /// Render the joint hierarchy as an indented listing.
    pub fn format_tree(&self) -> String {
        let mut out = String::new();
        for joint in &self.joints {
            let mut depth = 0usize;
            let mut parent = joint.parent;
            while let Some(id) = parent {
                // Out-of-range or cyclic parent links stop the walk.
                if depth > self.joints.len() {
                    break;
                }
                depth += 1;
                parent = self.joints.get(id as usize).and_then(|j| j.parent);
            }
            let _ = writeln!(
                out,
                "{:indent$}{} [{:04x}..{:04x}]",
                "",
                joint.name,
                joint.children_start,
                joint.children_end,
                indent = depth * 2
            );
        }
        out
    }
}

/// Extractor caching parsed skeletons.
pub struct SkeletonExtractor;

impl Extractor for SkeletonExtractor {
    fn extract(&self, ctx: &ExtractContext<'_, '_>) -> std::result::Result<Extracted, BoxError> {
        let skeleton = Skeleton::parse(ctx.payload()?)?;
        debug!(
            "skeleton '{}': {} joint(s), {} inverse matrices",
            ctx.node().path,
            skeleton.joints.len(),
            skeleton.inverse_matrices.len()
        );
        Ok(Extracted {
            cache: Some(Box::new(skeleton)),
            artifacts: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct JointSpec {
        name: &'static str,
        flags: u32,
        children: (u16, u16),
        parent: u16,
    }

    /// Build a skeleton payload with sequentially laid out pose arrays.
    fn skeleton_payload(joints: &[JointSpec], inverse_mat_count: usize) -> Vec<u8> {
        let count = joints.len();
        let data_offset = HEADER_SIZE + count * (JOINT_SIZE + NAME_SIZE);

        let mut data = vec![0u8; data_offset];
        data[0..4].copy_from_slice(&SKEL_MAGIC.to_le_bytes());
        data[0x1C..0x20].copy_from_slice(&(count as u32).to_le_bytes());
        data[0x28..0x2C].copy_from_slice(&(data_offset as u32).to_le_bytes());

        for (i, spec) in joints.iter().enumerate() {
            let at = HEADER_SIZE + i * JOINT_SIZE;
            data[at..at + 4].copy_from_slice(&spec.flags.to_le_bytes());
            data[at + 4..at + 6].copy_from_slice(&spec.children.0.to_le_bytes());
            data[at + 6..at + 8].copy_from_slice(&spec.children.1.to_le_bytes());
            data[at + 8..at + 10].copy_from_slice(&spec.parent.to_le_bytes());

            let at = HEADER_SIZE + count * JOINT_SIZE + i * NAME_SIZE;
            data[at..at + spec.name.len()].copy_from_slice(spec.name.as_bytes());
        }

        // Pose data header, then the arrays back to back.
        let rows_offset = DATA_HEADER_SIZE + count * 0x40;
        let inverse_offset = rows_offset + 0x10;
        let positions_offset = inverse_offset + inverse_mat_count * 0x40;
        let ints_offset = positions_offset + count * 0x10;
        let scales_offset = ints_offset + count * 0x10;
        let floats_offset = scales_offset + count * 0x10;
        let end = floats_offset + count * 0x10;

        let mut header = vec![0u8; DATA_HEADER_SIZE];
        header[0..4].copy_from_slice(&(count as u32).to_le_bytes());
        header[4..8].copy_from_slice(&(rows_offset as u32).to_le_bytes());
        // index-row count field: zero means one row
        header[12..16].copy_from_slice(&(inverse_offset as u32).to_le_bytes());
        header[16..20].copy_from_slice(&(inverse_mat_count as u32).to_le_bytes());
        header[32..36].copy_from_slice(&(positions_offset as u32).to_le_bytes());
        header[36..40].copy_from_slice(&(ints_offset as u32).to_le_bytes());
        header[40..44].copy_from_slice(&(scales_offset as u32).to_le_bytes());
        header[44..48].copy_from_slice(&(floats_offset as u32).to_le_bytes());
        data.extend(header);
        data.resize(data_offset + end, 0);

        // Identity bind matrices, positions (i, 2i, 3i, 1).
        for i in 0..count {
            let at = data_offset + DATA_HEADER_SIZE + i * 0x40;
            for d in 0..4 {
                let cell = at + (d * 4 + d) * 4;
                data[cell..cell + 4].copy_from_slice(&1.0f32.to_le_bytes());
            }
            let at = data_offset + positions_offset + i * 0x10;
            for (c, value) in [i as f32, 2.0 * i as f32, 3.0 * i as f32, 1.0]
                .iter()
                .enumerate()
            {
                data[at + c * 4..at + c * 4 + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
        data
    }

    fn two_bone_payload() -> Vec<u8> {
        skeleton_payload(
            &[
                JointSpec {
                    name: "root",
                    flags: 0,
                    children: (1, 1),
                    parent: JOINT_NONE,
                },
                JointSpec {
                    name: "bone",
                    flags: INVERSE_FLAGS,
                    children: (JOINT_NONE, JOINT_NONE),
                    parent: 0,
                },
            ],
            1,
        )
    }

    #[test]
    fn test_parse_joints() {
        let skeleton = Skeleton::parse(&two_bone_payload()).unwrap();

        assert_eq!(skeleton.joints.len(), 2);
        assert_eq!(skeleton.joints[0].name, "root");
        assert_eq!(skeleton.joints[0].parent, None);
        assert_eq!(skeleton.joints[0].children_start, 1);
        assert_eq!(skeleton.joints[1].name, "bone");
        assert_eq!(skeleton.joints[1].parent, Some(0));
        assert_eq!(skeleton.joints[1].children_start, JOINT_NONE);
    }

    #[test]
    fn test_inverse_ids_count_flagged_joints() {
        let skeleton = Skeleton::parse(&two_bone_payload()).unwrap();

        assert_eq!(skeleton.joints[0].inverse, None);
        assert_eq!(skeleton.joints[1].inverse, Some(0));
        assert_eq!(skeleton.inverse_matrices.len(), 1);
    }

    #[test]
    fn test_parse_pose_arrays() {
        let skeleton = Skeleton::parse(&two_bone_payload()).unwrap();

        assert_eq!(skeleton.bind_matrices.len(), 2);
        assert_eq!(skeleton.bind_matrices[0][0], 1.0);
        assert_eq!(skeleton.bind_matrices[0][5], 1.0);
        assert_eq!(skeleton.bind_matrices[0][1], 0.0);
        assert_eq!(skeleton.bind_positions[1], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(skeleton.index_rows.len(), 1);
        assert_eq!(skeleton.bind_scales.len(), 2);
    }

    #[test]
    fn test_format_tree_indents_children() {
        let skeleton = Skeleton::parse(&two_bone_payload()).unwrap();
        let tree = skeleton.format_tree();

        let lines: Vec<&str> = tree.lines().collect();
        assert!(lines[0].starts_with("root "));
        assert!(lines[1].starts_with("  bone "));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = two_bone_payload();
        data[0] = 0xFF;
        assert!(matches!(Skeleton::parse(&data), Err(Error::BadMagic(_))));
    }

    #[test]
    fn test_truncated_pose_data() {
        let mut data = two_bone_payload();
        data.truncate(data.len() - 8);
        assert!(matches!(Skeleton::parse(&data), Err(Error::Common(_))));
    }
}
