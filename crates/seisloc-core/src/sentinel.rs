//! The `-9999` absence sentinel used at the flat-array boundary.
//!
//! Inside the crates absence is an `Option`; the sentinel exists only in
//! the flat buffers shared with compute devices and external files.

/// Integer absence marker in delay and node-index channels.
pub const NULL_I32: i32 = -9999;

/// Real absence marker in residual channels.
pub const NULL_F32: f32 = -9999.0;

/// Decode a sentinel-encoded integer cell.
#[inline]
pub fn decode_i32(raw: i32) -> Option<i32> {
    (raw != NULL_I32).then_some(raw)
}

/// Encode an optional integer into its sentinel form.
#[inline]
pub fn encode_i32(value: Option<i32>) -> i32 {
    value.unwrap_or(NULL_I32)
}

/// Decode a sentinel-encoded real cell.
#[inline]
pub fn decode_f32(raw: f32) -> Option<f32> {
    (raw != NULL_F32).then_some(raw)
}

/// Encode an optional real into its sentinel form.
#[inline]
pub fn encode_f32(value: Option<f32>) -> f32 {
    value.unwrap_or(NULL_F32)
}
