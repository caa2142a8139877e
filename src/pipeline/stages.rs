// SPDX-License-Identifier: GPL-3.0-only

//! Stage order and uniform derivation
//!
//! This is the only place a [`ParameterSet`] and a [`SubjectContext`] are
//! turned into shader constants. The GPU pipeline and the CPU reference both
//! consume the result, so they cannot drift apart.

use crate::constants::{composite, effects, lens};
use crate::params::{ParameterSet, PreviewMode};
use crate::resolution::Resolution;
use crate::saliency::{FrameRegion, SubjectContext};
use crate::shaders::common::{CompositeParams, EffectsParams, InputParams, LensParams};

/// Fixed per-frame stage order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Input,
    Lens,
    Effects,
    Composite,
}

impl StageKind {
    pub const ORDER: [StageKind; 4] = [
        StageKind::Input,
        StageKind::Lens,
        StageKind::Effects,
        StageKind::Composite,
    ];
}

/// Surface sizes a frame is rendered at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDims {
    /// Ping-pong surface size
    pub processing: Resolution,
    /// Composited output size (the viewport)
    pub output: Resolution,
}

/// Uniform values for every stage of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageUniforms {
    pub input: InputParams,
    pub lens: LensParams,
    pub effects: EffectsParams,
    pub composite: CompositeParams,
}

impl StageUniforms {
    pub fn derive(
        params: &ParameterSet,
        subject: &SubjectContext,
        dims: StageDims,
        frame_index: u32,
    ) -> Self {
        let Resolution { width, height } = dims.processing;
        let (lens_center_x, lens_center_y) = lens_center(params);
        let (focus_center_x, focus_center_y) = subject.blended_center(lens_center_x, lens_center_y);
        let strength = subject.strength.clamp(0.0, 1.0);
        let iso_norm = params.iso_norm();
        let noise_reduction = params.noise_reduction.clamp(0.0, 1.0);

        let headroom = if params.tone_map {
            effects::TONE_MAP_HEADROOM
        } else {
            1.0
        };

        let input = InputParams {
            width,
            height,
            exposure_gain: params.exposure_gain(),
            headroom,
        };

        let lens = LensParams {
            width,
            height,
            lens_center_x,
            lens_center_y,
            focus_center_x,
            focus_center_y,
            distortion_k: lens::DISTORTION_K_SCALE * params.distortion,
            zoom: 1.0 + lens::ZOOM_RANGE * params.focal_norm(),
            ca_offset: lens::CA_MAX_OFFSET * params.chromatic_aberration.max(0.0),
            vignette_strength: params.vignette.clamp(0.0, 1.0),
            _padding0: 0,
            _padding1: 0,
        };

        let bbox = subject.bbox;
        let effects = EffectsParams {
            width,
            height,
            frame_index,
            tone_map: params.tone_map as u32,
            focus_center_x,
            focus_center_y,
            focus_plane: params.focus_plane(),
            subject_protection: effects::SUBJECT_COC_PROTECTION * strength,
            subject_x: bbox.x,
            subject_y: bbox.y,
            subject_w: bbox.width,
            subject_h: bbox.height,
            motion_blur_px: params.shutter_norm() * effects::MOTION_BLUR_MAX_PX,
            defocus_blur_px: params.aperture_norm() * effects::DEFOCUS_BLUR_MAX_PX,
            nr_blend: iso_norm * noise_reduction,
            noise_amplitude: effects::ISO_NOISE_MAX
                * iso_norm
                * (1.0 - effects::NOISE_REDUCTION_SUPPRESSION * noise_reduction),
            sharpen_gain: effects::SHARPEN_GAIN * params.sharpen.max(0.0),
            contrast: params.contrast,
            saturation: params.saturation,
            headroom,
            wb_r: 1.0 + effects::WB_TEMPERATURE_GAIN * params.wb_temperature,
            wb_g: 1.0 - effects::WB_TINT_GAIN * params.wb_tint,
            wb_b: 1.0 - effects::WB_TEMPERATURE_GAIN * params.wb_temperature,
            _padding1: 0.0,
        };

        Self {
            input,
            lens,
            effects,
            composite: composite_params(params.preview_mode, params.split_position, dims),
        }
    }
}

/// Optical center after lens shift, kept inside the safety margin
pub fn lens_center(params: &ParameterSet) -> (f32, f32) {
    let (lo, hi) = (lens::LENS_CENTER_MARGIN, 1.0 - lens::LENS_CENTER_MARGIN);
    (
        (0.5 + lens::LENS_SHIFT_RANGE * params.lens_shift_x).clamp(lo, hi),
        (0.5 + lens::LENS_SHIFT_RANGE * params.lens_shift_y).clamp(lo, hi),
    )
}

/// Normalized rectangle the image occupies when contained in the output
pub fn contain_rect(image: Resolution, output: Resolution) -> FrameRegion {
    let image_aspect = image.width.max(1) as f32 / image.height.max(1) as f32;
    let output_aspect = output.width.max(1) as f32 / output.height.max(1) as f32;

    if image_aspect > output_aspect {
        let h = output_aspect / image_aspect;
        FrameRegion::new(0.0, (1.0 - h) * 0.5, 1.0, h)
    } else {
        let w = image_aspect / output_aspect;
        FrameRegion::new((1.0 - w) * 0.5, 0.0, w, 1.0)
    }
}

/// Composite uniforms for a preview mode
pub fn composite_params(mode: PreviewMode, split_position: f32, dims: StageDims) -> CompositeParams {
    let rect = contain_rect(dims.processing, dims.output);
    CompositeParams {
        out_width: dims.output.width,
        out_height: dims.output.height,
        mode: mode.shader_code(),
        _padding0: 0,
        split_position: split_position.clamp(0.0, 1.0),
        rect_x: rect.x,
        rect_y: rect.y,
        rect_w: rect.width,
        rect_h: rect.height,
        background_r: composite::BACKGROUND[0],
        background_g: composite::BACKGROUND[1],
        background_b: composite::BACKGROUND[2],
    }
}
