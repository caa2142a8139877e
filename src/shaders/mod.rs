// SPDX-License-Identifier: GPL-3.0-only

//! Stage shader sources and shared GPU helpers
//!
//! Every stage shader is composed at pipeline construction as
//! `constants prelude + COMMON_FUNCTIONS + stage source`. The prelude is
//! generated from [`crate::constants`], so the calibration values exist in one
//! place only.

pub mod common;
mod gpu_processor;

pub use gpu_processor::{
    CachedDimensions, compute_dispatch_size, padded_bytes_per_row, read_buffer_async,
    read_texture_rgba, unpad_rows,
};

use crate::constants::{effects, lens};

/// Compute shaders making up the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageShader {
    Input,
    Lens,
    Effects,
    Composite,
    Resample,
}

impl StageShader {
    pub const ALL: [StageShader; 5] = [
        StageShader::Input,
        StageShader::Lens,
        StageShader::Effects,
        StageShader::Composite,
        StageShader::Resample,
    ];

    /// Label used for wgpu objects and log fields
    pub fn label(&self) -> &'static str {
        match self {
            StageShader::Input => "input",
            StageShader::Lens => "lens",
            StageShader::Effects => "effects",
            StageShader::Composite => "composite",
            StageShader::Resample => "resample",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            StageShader::Input => include_str!("input.wgsl"),
            StageShader::Lens => include_str!("lens.wgsl"),
            StageShader::Effects => include_str!("effects.wgsl"),
            StageShader::Composite => include_str!("composite.wgsl"),
            StageShader::Resample => include_str!("resample.wgsl"),
        }
    }

    /// Complete WGSL source ready for `create_shader_module`
    pub fn source(&self) -> String {
        format!(
            "{}\n{}\n{}",
            constants_prelude(),
            common::COMMON_FUNCTIONS,
            self.body()
        )
    }
}

/// WGSL `const` declarations for the calibration constants the shaders use
pub fn constants_prelude() -> String {
    let constants: [(&str, f32); 17] = [
        ("LUMA_R", effects::LUMA_WEIGHTS[0]),
        ("LUMA_G", effects::LUMA_WEIGHTS[1]),
        ("LUMA_B", effects::LUMA_WEIGHTS[2]),
        ("CENTER_EPSILON", lens::CENTER_EPSILON),
        ("VIGNETTE_INNER", lens::VIGNETTE_INNER),
        ("VIGNETTE_OUTER", lens::VIGNETTE_OUTER),
        ("MAX_CENTER_DISTANCE", effects::MAX_CENTER_DISTANCE),
        ("KERNEL_CENTER_WEIGHT", effects::KERNEL_CENTER_WEIGHT),
        ("KERNEL_INNER_WEIGHT", effects::KERNEL_INNER_WEIGHT),
        ("KERNEL_OUTER_WEIGHT", effects::KERNEL_OUTER_WEIGHT),
        ("NOISE_REDUCTION_RADIUS_PX", effects::NOISE_REDUCTION_RADIUS_PX),
        ("CONTRAST_PIVOT", effects::CONTRAST_PIVOT),
        ("TONE_A", effects::TONE_A),
        ("TONE_B", effects::TONE_B),
        ("TONE_C", effects::TONE_C),
        ("TONE_D", effects::TONE_D),
        ("TONE_E", effects::TONE_E),
    ];

    constants
        .iter()
        .map(|(name, value)| format!("const {}: f32 = {:?};\n", name, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {:?}", name, e);
            }
        }
    }

    #[test]
    fn test_input_shader_validates() {
        validate_shader("input", &StageShader::Input.source());
    }

    #[test]
    fn test_lens_shader_validates() {
        validate_shader("lens", &StageShader::Lens.source());
    }

    #[test]
    fn test_effects_shader_validates() {
        validate_shader("effects", &StageShader::Effects.source());
    }

    #[test]
    fn test_composite_shader_validates() {
        validate_shader("composite", &StageShader::Composite.source());
    }

    #[test]
    fn test_resample_shader_validates() {
        validate_shader("resample", &StageShader::Resample.source());
    }

    #[test]
    fn test_prelude_uses_float_literals() {
        let prelude = constants_prelude();
        assert!(prelude.contains("const TONE_A: f32 = 2.51;"));
        assert!(prelude.contains("const KERNEL_CENTER_WEIGHT: f32 = 0.2;"));
        assert_eq!(prelude.lines().count(), 17);
    }
}
