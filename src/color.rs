// SPDX-License-Identifier: GPL-3.0-only

//! Color helpers shared by the CPU reference and the subject estimator
//!
//! These match the functions in `shaders/common.wgsl`.

use crate::constants::effects::LUMA_WEIGHTS;

/// sRGB transfer function decode (exact piecewise form)
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB transfer function encode
#[inline]
pub fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Linear luminance of an 8-bit sRGB pixel
#[inline]
pub fn luminance_srgb8(r: u8, g: u8, b: u8) -> f32 {
    luminance(
        srgb_to_linear(r as f32 / 255.0),
        srgb_to_linear(g as f32 / 255.0),
        srgb_to_linear(b as f32 / 255.0),
    )
}

/// Rec. 709 luma of linear RGB
#[inline]
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b
}

/// Hermite smoothstep, as in WGSL
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
