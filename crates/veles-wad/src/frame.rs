//! Tag frame decoding.
//!
//! A WAD archive is a flat sequence of fixed-size frames, each carrying a
//! 16-bit tag, a 32-bit payload size and a NUL-padded name. The payload
//! follows the frame and is padded to a 16-byte boundary; the tag's meaning
//! depends on the container generation.

use veles_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::{Error, Result};

/// First-frame tag value identifying the first container generation.
pub const V1_HEADER_TAG: u32 = 0x378;
/// First-frame tag value identifying the second container generation.
pub const V2_HEADER_TAG: u32 = 0x15;

/// A known revision of the container format.
///
/// The two generations use disjoint tag tables and different frame sizes,
/// but share the framing rule: each payload is padded to 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// First generation: 32-byte frames, 24-byte name field.
    V1,
    /// Second generation: 16-byte frames, 8-byte name field.
    V2,
}

impl Generation {
    /// Detect the generation from the archive's first frame tag.
    pub fn detect(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let first_tag = reader.read_u32().map_err(|_| Error::TruncatedFrame {
            offset: 0,
            needed: 4,
            available: data.len(),
        })?;
        match first_tag {
            V1_HEADER_TAG => Ok(Generation::V1),
            V2_HEADER_TAG => Ok(Generation::V2),
            other => Err(Error::UnknownGeneration(other)),
        }
    }

    /// Size of one frame in bytes.
    #[inline]
    pub const fn frame_size(self) -> usize {
        match self {
            Generation::V1 => 32,
            Generation::V2 => 16,
        }
    }

    /// Size of the NUL-padded name field.
    #[inline]
    const fn name_size(self) -> usize {
        match self {
            Generation::V1 => 24,
            Generation::V2 => 8,
        }
    }

    /// Map a raw tag to its abstract record kind.
    ///
    /// Tags outside the table carry bookkeeping the extractor does not need
    /// and are treated as ignorable.
    pub fn classify(self, tag: u16) -> RecordKind {
        match self {
            Generation::V1 => match tag {
                0x1E => RecordKind::Payload,
                0x28 => RecordKind::GroupStart,
                0x32 => RecordKind::GroupEnd,
                0x18 => RecordKind::EntityCount,
                _ => RecordKind::Ignorable,
            },
            Generation::V2 => match tag {
                0x01 => RecordKind::Payload,
                0x02 => RecordKind::GroupStart,
                0x03 => RecordKind::GroupEnd,
                0x00 => RecordKind::EntityCount,
                _ => RecordKind::Ignorable,
            },
        }
    }
}

/// Abstract meaning of one frame, independent of the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Opens a group; the next payload record becomes the group node.
    GroupStart,
    /// Closes the innermost open group.
    GroupEnd,
    /// A named resource (data when the size is nonzero, link otherwise).
    Payload,
    /// Heap and section bookkeeping with no effect on the tree.
    Ignorable,
    /// Entity count marker. Its stored size field is garbage and must be
    /// treated as zero or every following frame misparses.
    EntityCount,
}

/// Fixed 8-byte prefix shared by both frame layouts.
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
struct RawFrameHeader {
    tag: u16,
    _pad: u16,
    size: u32,
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Absolute offset of the frame itself.
    pub offset: usize,
    /// Raw tag value.
    pub tag: u16,
    /// Declared payload size (already forced to zero for entity counts).
    pub size: u32,
    /// Record name, truncated at the first NUL.
    pub name: String,
    /// Abstract record kind for this generation.
    pub kind: RecordKind,
    /// Absolute offset of the payload following the frame.
    pub payload_offset: usize,
}

/// Sequential reader over the archive's frame stream.
///
/// After each frame the cursor advances by the frame size plus the payload
/// size rounded up to the next 16-byte boundary. That alignment rule is part
/// of the format; without it every subsequent frame misparses.
#[derive(Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    position: usize,
    generation: Generation,
}

/// Round a payload size up to the next 16-byte boundary.
#[inline]
pub const fn align16(size: u32) -> u32 {
    (size + 15) & !15
}

impl<'a> FrameReader<'a> {
    /// Create a frame reader, auto-detecting the generation when `generation`
    /// is `None`.
    pub fn new(data: &'a [u8], generation: Option<Generation>) -> Result<Self> {
        let generation = match generation {
            Some(generation) => generation,
            None => Generation::detect(data)?,
        };
        Ok(Self {
            data,
            position: 0,
            generation,
        })
    }

    /// The archive generation in use.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Decode the next frame, or `None` at a clean end of stream.
    ///
    /// A trailing partial frame is a [`Error::TruncatedFrame`].
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame_size = self.generation.frame_size();
        let remaining = self.data.len().saturating_sub(self.position);
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < frame_size {
            return Err(Error::TruncatedFrame {
                offset: self.position,
                needed: frame_size,
                available: remaining,
            });
        }

        let offset = self.position;
        let mut reader = BinaryReader::new_at(self.data, offset);
        let header: RawFrameHeader = reader.read_struct()?;
        let name = reader
            .read_string_in_buffer(self.generation.name_size())?
            .to_owned();

        let kind = self.generation.classify(header.tag);
        let size = match kind {
            RecordKind::EntityCount => 0,
            _ => header.size,
        };

        self.position = offset + frame_size + align16(size) as usize;

        Ok(Some(Frame {
            offset,
            tag: header.tag,
            size,
            name,
            kind,
            payload_offset: offset + frame_size,
        }))
    }
}
