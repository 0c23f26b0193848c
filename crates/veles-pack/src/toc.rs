//! Table-of-contents parser.
//!
//! Two table layouts shipped. The first generation is a flat run of fixed
//! 24-byte entries; an entry with an empty name (or the end of the buffer)
//! terminates the table. The second generation is count-prefixed 36-byte
//! entries whose start field indexes a sector position map appended after
//! the table. In both, duplicate names are shipped copies of the same
//! record, kept once.

use tracing::{debug, warn};
use veles_common::BinaryReader;

use crate::Result;

/// Bytes per storage sector.
pub const SECTOR_SIZE: u64 = 0x800;

/// Size of one first-generation TOC entry.
const ENTRY_SIZE: usize = 24;

/// Size of one second-generation TOC entry.
const ENTRY_SIZE_V2: usize = 36;

/// Sectors per volume file in the second generation; position-map values
/// past this many sectors continue in the next volume.
const SECTORS_PER_VOLUME: u32 = (0x3FFF_F800u64 / SECTOR_SIZE) as u32;

/// Table-of-contents layout revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocGeneration {
    V1,
    V2,
}

impl TocGeneration {
    /// Sniff the layout from the first four bytes.
    ///
    /// A first-generation table opens with a printable file name; anything
    /// else (a binary entry count, or printable bytes resuming after a
    /// NUL) is the second generation.
    pub fn detect(data: &[u8]) -> Self {
        let mut terminated = false;
        for &byte in data.iter().take(4) {
            if byte == 0 {
                terminated = true;
            } else if !(20..=127).contains(&byte) || terminated {
                return TocGeneration::V2;
            }
        }
        TocGeneration::V1
    }
}

/// One record of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    /// Zero-based volume index the record starts in.
    pub volume: u32,
    /// Record size in bytes.
    pub size: u32,
    /// Start sector within the volume.
    pub start_sector: u32,
}

/// Parse a table of contents, preserving entry order.
///
/// The layout revision is sniffed from the leading bytes; see
/// [`TocGeneration::detect`].
pub fn parse_toc(data: &[u8]) -> Result<Vec<TocEntry>> {
    let generation = TocGeneration::detect(data);
    debug!("detected {generation:?} table of contents");
    match generation {
        TocGeneration::V1 => parse_toc_v1(data),
        TocGeneration::V2 => parse_toc_v2(data),
    }
}

/// Keep the first copy of a record, warning when a duplicate disagrees.
fn push_entry(entries: &mut Vec<TocEntry>, entry: TocEntry) {
    if let Some(existing) = entries.iter().find(|e| e.name == entry.name) {
        if existing.size != entry.size {
            warn!(
                "'{}' listed twice with differing sizes ({} vs {})",
                entry.name, existing.size, entry.size
            );
        }
        return;
    }
    entries.push(entry);
}

fn parse_toc_v1(data: &[u8]) -> Result<Vec<TocEntry>> {
    let mut entries: Vec<TocEntry> = Vec::new();

    for offset in (0..data.len().saturating_sub(ENTRY_SIZE - 1)).step_by(ENTRY_SIZE) {
        let mut reader = BinaryReader::new_at(data, offset);
        let name = reader.read_string_in_buffer(12)?;
        if name.is_empty() {
            break;
        }

        let entry = TocEntry {
            name: name.to_owned(),
            volume: reader.read_u32()?,
            size: reader.read_u32()?,
            start_sector: reader.read_u32()?,
        };
        push_entry(&mut entries, entry);
    }

    Ok(entries)
}

fn parse_toc_v2(data: &[u8]) -> Result<Vec<TocEntry>> {
    let mut reader = BinaryReader::new(data);
    let count = reader.read_u32()? as usize;

    let mut entries: Vec<TocEntry> = Vec::with_capacity(count);
    // Until the position map below is applied, start_sector holds the
    // entry's map index and volume is unresolved.
    let mut max_index = 0u32;
    for _ in 0..count {
        let name = reader.read_string_in_buffer(24)?;
        let size = reader.read_u32()?;
        reader.advance(4);
        let map_index = reader.read_u32()?;

        max_index = max_index.max(map_index);
        push_entry(
            &mut entries,
            TocEntry {
                name: name.to_owned(),
                volume: 0,
                size,
                start_sector: map_index,
            },
        );
    }

    let mut position_map = Vec::with_capacity(max_index as usize + 1);
    for _ in 0..=max_index {
        position_map.push(reader.read_u32()?);
    }

    for entry in &mut entries {
        let position = position_map[entry.start_sector as usize];
        entry.start_sector = position % SECTORS_PER_VOLUME;
        entry.volume = position / SECTORS_PER_VOLUME;
    }

    Ok(entries)
}
