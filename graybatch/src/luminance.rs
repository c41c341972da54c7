//! Luminance calculation using ITU-R BT.601 coefficients.
//!
//! Both converters go through [`luma_u8`] (the WGSL kernel spells out the
//! same integer expression), so CPU and GPU output agree byte for byte.

/// ITU-R BT.601 coefficient for the red channel.
pub const LUMA_R: f32 = 0.299;

/// ITU-R BT.601 coefficient for the green channel.
pub const LUMA_G: f32 = 0.587;

/// ITU-R BT.601 coefficient for the blue channel.
pub const LUMA_B: f32 = 0.114;

/// Per-mille weights matching `LUMA_R`, `LUMA_G` and `LUMA_B` exactly.
pub const LUMA_R_PERMILLE: u32 = 299;
pub const LUMA_G_PERMILLE: u32 = 587;
pub const LUMA_B_PERMILLE: u32 = 114;

/// Luminance from normalized RGB values (0.0 to 1.0).
#[inline]
pub fn luma_f32(r: f32, g: f32, b: f32) -> f32 {
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

/// Luminance from 8-bit RGB values, rounded to the nearest integer.
///
/// Computed in integer arithmetic: `(299r + 587g + 114b + 500) / 1000`.
/// Ties round up, which is what `f64::round` does for the exact value.
#[inline]
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    let weighted = LUMA_R_PERMILLE * r as u32
        + LUMA_G_PERMILLE * g as u32
        + LUMA_B_PERMILLE * b as u32;
    // max is 255_500 / 1000 = 255
    ((weighted + 500) / 1000) as u8
}
