//! Packed attribute stream decoder.
//!
//! Each mesh packet is a sequence of 4-byte-aligned control words addressed
//! to the console's vertex upload unit. Unpack commands (`>= 0x60`) carry a
//! run of same-shaped vertex data; control commands below that set transfer
//! registers or call the microprogram that consumes everything uploaded so
//! far. The decoder mirrors that protocol: runs accumulate in one pending
//! slot per semantic class and a microprogram call flushes them into an
//! [`AttributeBlock`].
//!
//! A run's semantic class is fully determined by its element width,
//! component count and signedness:
//!
//! | shape            | class                              |
//! |------------------|------------------------------------|
//! | 16 bit x4 signed | position + strip flag, 12.4 fixed  |
//! | 16 bit x2 signed | texture coords, 12.4 fixed         |
//! | 32 bit x2 signed | texture coords, wide, 12.4 fixed   |
//! |  8 bit x3 signed | normal, scaled by 1/100            |
//! |  8 bit x4 unsigned | blend color, raw bytes           |
//! | 32 bit x4 signed | joint/weight metadata, not decoded |

use std::fmt;

use tracing::{debug, trace};
use veles_common::fixed;

use crate::{Error, Result};

/// Element widths in bits, indexed by the low two command bits.
const WIDTH_MAP: [u32; 4] = [32, 16, 8, 4];

/// Control opcodes understood by the scanner.
const OP_NOP: u8 = 0x00;
const OP_SET_CYCLE: u8 = 0x01;
const OP_SET_MODE: u8 = 0x05;
const OP_CALL_MICROPROGRAM: u8 = 0x14;
const OP_WRITE_ROWS: u8 = 0x30;
/// Unpack commands start here; the high three bits select unpack.
const CMD_UNPACK_BASE: u8 = 0x60;

/// One vertex position with its triangle-strip continuation flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Set when this vertex does not close a triangle with its two
    /// predecessors (a strip restart).
    pub terminates_strip: bool,
}

/// One decoded vertex run between two flush points.
///
/// The optional arrays, when present, parallel `positions`.
#[derive(Debug, Clone, Default)]
pub struct AttributeBlock {
    pub positions: Vec<StripVertex>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub blend: Option<Vec<[u8; 4]>>,
}

/// Semantic class of an attribute run, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunClass {
    Position,
    Uv,
    Normal,
    Blend,
}

impl fmt::Display for RunClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunClass::Position => write!(f, "position"),
            RunClass::Uv => write!(f, "uv"),
            RunClass::Normal => write!(f, "normal"),
            RunClass::Blend => write!(f, "blend"),
        }
    }
}

/// Bytes per texture-coordinate component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UvWidth {
    Half, // i16 components
    Wide, // i32 components
}

/// Pending attribute runs between flushes, one slot per semantic class.
///
/// The slots borrow the packet's bytes; decoding happens at flush time.
#[derive(Default)]
struct PendingRuns<'a> {
    positions: Option<&'a [u8]>,
    uvs: Option<(&'a [u8], UvWidth)>,
    normals: Option<&'a [u8]>,
    blend: Option<&'a [u8]>,
}

impl<'a> PendingRuns<'a> {
    fn set(&mut self, class: RunClass, data: &'a [u8], uv_width: UvWidth, offset: usize) -> Result<()> {
        let slot = match class {
            RunClass::Position => &mut self.positions,
            RunClass::Normal => &mut self.normals,
            RunClass::Blend => &mut self.blend,
            RunClass::Uv => {
                if self.uvs.is_some() {
                    return Err(Error::DuplicateAttribute { class, offset });
                }
                self.uvs = Some((data, uv_width));
                return Ok(());
            }
        };
        if slot.is_some() {
            return Err(Error::DuplicateAttribute { class, offset });
        }
        *slot = Some(data);
        Ok(())
    }

    /// Materialize one block from the pending runs and clear them.
    ///
    /// Without a pending position run this is a no-op: the other classes
    /// only have meaning relative to positions.
    fn flush(&mut self) -> Option<AttributeBlock> {
        let positions_data = self.positions.take()?;
        let uvs = self.uvs.take();
        let normals = self.normals.take();
        let blend = self.blend.take();

        let positions = positions_data
            .chunks_exact(8)
            .map(|chunk| StripVertex {
                x: fixed::from_i16(i16::from_le_bytes([chunk[0], chunk[1]])),
                y: fixed::from_i16(i16::from_le_bytes([chunk[2], chunk[3]])),
                z: fixed::from_i16(i16::from_le_bytes([chunk[4], chunk[5]])),
                // Strip restart flag lives in the high nibble of the 4th
                // component's high byte.
                terminates_strip: chunk[7] & 0x80 != 0,
            })
            .collect();

        let uvs = uvs.map(|(data, width)| match width {
            UvWidth::Half => data
                .chunks_exact(4)
                .map(|c| {
                    [
                        fixed::from_i16(i16::from_le_bytes([c[0], c[1]])),
                        fixed::from_i16(i16::from_le_bytes([c[2], c[3]])),
                    ]
                })
                .collect(),
            UvWidth::Wide => data
                .chunks_exact(8)
                .map(|c| {
                    [
                        fixed::from_i32(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                        fixed::from_i32(i32::from_le_bytes([c[4], c[5], c[6], c[7]])),
                    ]
                })
                .collect(),
        });

        let normals = normals.map(|data| {
            data.chunks_exact(3)
                .map(|c| {
                    [
                        c[0] as i8 as f32 / 100.0,
                        c[1] as i8 as f32 / 100.0,
                        c[2] as i8 as f32 / 100.0,
                    ]
                })
                .collect()
        });

        let blend = blend.map(|data| {
            data.chunks_exact(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect()
        });

        Some(AttributeBlock {
            positions,
            uvs,
            normals,
            blend,
        })
    }
}

/// Decode one packet's attribute stream into vertex blocks.
///
/// `base_offset` is the packet's absolute offset within the resource; it is
/// only used to report absolute positions in errors and logs.
pub fn decode_stream(stream: &[u8], base_offset: usize) -> Result<Vec<AttributeBlock>> {
    let mut blocks = Vec::new();
    let mut pending = PendingRuns::default();
    let mut pos = 0usize;
    let mut consumed_any = false;
    // Cycle-length register; recorded for diagnostics only.
    let mut cycle_len = 0u8;

    loop {
        pos = (pos + 3) & !3;
        if pos + 4 > stream.len() {
            break;
        }

        let dat1 = stream[pos];
        let dat2 = stream[pos + 1];
        let num = stream[pos + 2];
        let cmd = stream[pos + 3];
        let word_offset = base_offset + pos;
        pos += 4;

        let mut flush = false;

        if cmd >= CMD_UNPACK_BASE {
            let components = ((cmd >> 2) & 0x3) + 1;
            let width = WIDTH_MAP[(cmd & 0x3) as usize];
            let run_len = (components as usize * width as usize * num as usize) / 8;
            let signed = ((dat2 >> 6) & 1) ^ 1 != 0;
            let addressed = dat2 & 0x80 != 0;
            let target = dat1 as u16 | ((dat2 & 0x3) as u16) << 8;

            if pos + run_len > stream.len() {
                return Err(Error::Truncated {
                    offset: word_offset,
                    len: base_offset + stream.len(),
                });
            }
            let run = &stream[pos..pos + run_len];
            pos += run_len;
            consumed_any = true;

            trace!(
                "{:#08x} unpack cmd {cmd:#04x}: {width} bit x{components}, {num} elements, \
                 signed: {signed}, addressed: {addressed}, target {target:#05x}",
                word_offset
            );

            match (width, components, signed) {
                (16, 4, true) => pending.set(RunClass::Position, run, UvWidth::Half, word_offset)?,
                (16, 2, true) => pending.set(RunClass::Uv, run, UvWidth::Half, word_offset)?,
                (32, 2, true) => pending.set(RunClass::Uv, run, UvWidth::Wide, word_offset)?,
                (8, 3, true) => pending.set(RunClass::Normal, run, UvWidth::Half, word_offset)?,
                (8, 4, false) => pending.set(RunClass::Blend, run, UvWidth::Half, word_offset)?,
                (32, 4, true) => {
                    // Joint/weight metadata. Always sent after the geometry
                    // runs of a sequence, so it implies a flush; the exact
                    // word semantics are not reverse-engineered.
                    for (i, element) in run.chunks_exact(16).enumerate() {
                        debug!(
                            "{:#08x} metadata[{i}]: {:02x?}",
                            base_offset + pos - run_len + i * 16,
                            element
                        );
                    }
                    flush = true;
                }
                _ => {
                    return Err(Error::UnhandledAttributeShape {
                        offset: word_offset,
                        cmd,
                        width,
                        components,
                        signed,
                    });
                }
            }
        } else {
            match cmd {
                OP_NOP => {}
                OP_SET_CYCLE => {
                    cycle_len = dat1;
                    trace!("{word_offset:#08x} set cycle wl={dat2:#x} cl={cycle_len:#x}");
                }
                OP_SET_MODE => {
                    trace!("{word_offset:#08x} set decompression mode {dat1}");
                }
                OP_CALL_MICROPROGRAM => {
                    trace!("{word_offset:#08x} microprogram call");
                    flush = true;
                }
                OP_WRITE_ROWS => {
                    // 16-byte immediate operand.
                    pos += 0x10;
                }
                _ => {
                    // Anything else marks the end of meaningful data, which
                    // is only an error when no data was seen at all.
                    if !consumed_any && blocks.is_empty() {
                        return Err(Error::UnknownOpcode {
                            offset: word_offset,
                            cmd,
                        });
                    }
                    debug!("{word_offset:#08x} opcode {cmd:#04x} ends the stream");
                    break;
                }
            }
        }

        if flush {
            if let Some(block) = pending.flush() {
                blocks.push(block);
            }
        }
    }

    // End of stream is an implicit flush point.
    if let Some(block) = pending.flush() {
        blocks.push(block);
    }

    Ok(blocks)
}
