// SPDX-License-Identifier: GPL-3.0-only

//! Stage uniform structs
//!
//! All #[repr(C)] structs passed to the stage shaders live here, one per WGSL
//! `Params` struct. Field order and padding must match the shader exactly;
//! every struct is a multiple of 16 bytes.

/// Input stage: resample the source and apply exposure gain
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InputParams {
    /// Processing surface width
    pub width: u32,
    /// Processing surface height
    pub height: u32,
    /// Linear gain 2^EV
    pub exposure_gain: f32,
    /// Linear value stored as 1.0 (> 1 keeps highlights for the tone curve)
    pub headroom: f32,
}

/// Lens stage: distortion, zoom, chromatic aberration, vignette
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LensParams {
    pub width: u32,
    pub height: u32,
    /// Optical center after lens shift (normalized)
    pub lens_center_x: f32,
    pub lens_center_y: f32,
    /// Lens center blended toward the subject (vignette center)
    pub focus_center_x: f32,
    pub focus_center_y: f32,
    /// Radial distortion coefficient k in p' = p + p|p|²k
    pub distortion_k: f32,
    /// Framing zoom, 1.0 (wide) to 2.2 (tele)
    pub zoom: f32,
    /// Chromatic aberration offset per unit radius
    pub ca_offset: f32,
    /// Vignette strength
    pub vignette_strength: f32,
    pub _padding0: u32,
    pub _padding1: u32,
}

/// Effects stage: synthetic depth of field, noise, sharpening, grading
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EffectsParams {
    pub width: u32,
    pub height: u32,
    /// Seed for the ISO noise hash
    pub frame_index: u32,
    /// 1 = apply the filmic tone curve
    pub tone_map: u32,

    // === Depth of field ===
    /// Subject-aware center scene depth is measured from
    pub focus_center_x: f32,
    pub focus_center_y: f32,
    /// Focus plane in normalized scene depth
    pub focus_plane: f32,
    /// Fraction of the CoC removed inside the subject box
    pub subject_protection: f32,
    /// Subject box (normalized)
    pub subject_x: f32,
    pub subject_y: f32,
    pub subject_w: f32,
    pub subject_h: f32,
    /// Shutter contribution to the blur radius in pixels
    pub motion_blur_px: f32,
    /// Blur radius in pixels at CoC = 1
    pub defocus_blur_px: f32,

    // === Noise ===
    /// Blend factor of the noise-reduction blur
    pub nr_blend: f32,
    /// ISO noise amplitude
    pub noise_amplitude: f32,

    // === Grading ===
    pub sharpen_gain: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Scale undoing the Input stage headroom on every fetch
    pub headroom: f32,
    /// White balance gains
    pub wb_r: f32,
    pub wb_g: f32,
    pub wb_b: f32,
    pub _padding1: f32,
}

/// Composite stage: contain fit and preview mode
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeParams {
    pub out_width: u32,
    pub out_height: u32,
    /// 0 = original, 1 = processed, 2 = split
    pub mode: u32,
    pub _padding0: u32,
    /// Normalized divider position in image space
    pub split_position: f32,
    /// Contained image rectangle in output space (normalized)
    pub rect_x: f32,
    pub rect_y: f32,
    pub rect_w: f32,
    pub rect_h: f32,
    /// Display-encoded background color
    pub background_r: f32,
    pub background_g: f32,
    pub background_b: f32,
}

/// Resample pass used for histogram views
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ResampleParams {
    pub width: u32,
    pub height: u32,
    pub _padding0: u32,
    pub _padding1: u32,
}
