//! 12.4 fixed-point conversion.
//!
//! The vertex stream format stores coordinates as signed integers scaled by
//! 4096, i.e. 12 integer bits and 4 sub-texel bits interpreted at 1/4096
//! granularity. Positions and texture coordinates both use this encoding.

/// Scale factor of the 12.4 fixed-point encoding.
pub const SCALE: f32 = 4096.0;

/// Decode a 16-bit 12.4 fixed-point value.
#[inline]
pub fn from_i16(raw: i16) -> f32 {
    raw as f32 / SCALE
}

/// Decode a 32-bit value carrying the same 1/4096 scaling.
///
/// Used by the wide texture-coordinate runs.
#[inline]
pub fn from_i32(raw: i32) -> f32 {
    raw as f32 / SCALE
}

/// Encode a float into 16-bit 12.4 fixed point, rounding to nearest.
///
/// Mainly useful for constructing test vectors.
#[inline]
pub fn to_i16(value: f32) -> i16 {
    (value * SCALE).round() as i16
}
