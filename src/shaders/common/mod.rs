// SPDX-License-Identifier: GPL-3.0-only

//! Shared shader utilities
//!
//! Common WGSL functions shared by every stage shader. These are concatenated
//! with stage-specific code at pipeline construction.

mod params;

pub use params::{CompositeParams, EffectsParams, InputParams, LensParams, ResampleParams};

/// Shared color and noise functions
///
/// Includes:
/// - `srgb_to_linear(c)` / `linear_to_srgb(c)` - exact piecewise transfer functions
/// - `luma(c)` - Rec. 709 luma of linear RGB
/// - `pcg_hash(v)` / `noise01(x, y, frame)` - integer hash noise
pub const COMMON_FUNCTIONS: &str = include_str!("common.wgsl");
