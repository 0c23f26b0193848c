//! Synthetic archive construction shared by the unit tests.

use crate::frame::align16;

/// Build one V1 frame with the given tag, size and name.
pub(crate) fn v1_frame(tag: u16, size: u32, name: &str) -> Vec<u8> {
    assert!(name.len() <= 24);
    let mut frame = vec![0u8; 32];
    frame[0..2].copy_from_slice(&tag.to_le_bytes());
    frame[4..8].copy_from_slice(&size.to_le_bytes());
    frame[8..8 + name.len()].copy_from_slice(name.as_bytes());
    frame
}

/// Append a V1 payload record with the given payload, padded to 16 bytes.
pub(crate) fn push_data(archive: &mut Vec<u8>, name: &str, payload: &[u8]) {
    archive.extend(v1_frame(0x1E, payload.len() as u32, name));
    archive.extend(payload);
    archive.extend(vec![0u8; (align16(payload.len() as u32) as usize) - payload.len()]);
}

/// Append a V1 link record (payload record with size zero).
pub(crate) fn push_link(archive: &mut Vec<u8>, name: &str) {
    archive.extend(v1_frame(0x1E, 0, name));
}

/// Append a V1 group-start marker.
pub(crate) fn push_group_start(archive: &mut Vec<u8>) {
    archive.extend(v1_frame(0x28, 0, ""));
}

/// Append a V1 group-end marker.
pub(crate) fn push_group_end(archive: &mut Vec<u8>) {
    archive.extend(v1_frame(0x32, 0, ""));
}

/// A data payload whose first 4 bytes carry the given format tag.
pub(crate) fn payload_with_format(format: u32, extra: &[u8]) -> Vec<u8> {
    let mut payload = format.to_le_bytes().to_vec();
    payload.extend(extra);
    payload
}
