// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame parameter snapshot
//!
//! A [`ParameterSet`] is an immutable value handed to each pipeline invocation.
//! Producers are expected to call [`ParameterSet::clamped`] before handoff; the
//! core only guards the few places where an out-of-range value would cause a
//! domain error.

use crate::constants::ranges;
use serde::{Deserialize, Serialize};

/// How the source is resampled when upscaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpscaleStyle {
    /// Bilinear resampling
    #[default]
    Smooth,
    /// Nearest-neighbor resampling (blocky pixels stay visible)
    Crisp,
}

/// Which image the composite shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreviewMode {
    /// Source only
    Original,
    /// Simulated result only
    Processed,
    /// Original left of the divider, processed right of it
    #[default]
    Split,
}

impl PreviewMode {
    /// Value passed to the composite shader
    pub fn shader_code(&self) -> u32 {
        match self {
            PreviewMode::Original => 0,
            PreviewMode::Processed => 1,
            PreviewMode::Split => 2,
        }
    }
}

/// Logical view fed to the histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistogramMode {
    /// Histogram is not recomputed
    Off,
    /// Source frame
    Original,
    /// Pipeline output before compositing
    Processed,
    /// Final composited output surface
    #[default]
    Composite,
}

impl HistogramMode {
    /// All modes for UI iteration
    pub const ALL: [HistogramMode; 4] = [
        HistogramMode::Off,
        HistogramMode::Original,
        HistogramMode::Processed,
        HistogramMode::Composite,
    ];

    /// Display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            HistogramMode::Off => "Off",
            HistogramMode::Original => "Original",
            HistogramMode::Processed => "Processed",
            HistogramMode::Composite => "Composite",
        }
    }
}

/// Immutable per-frame parameter snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    /// Exposure compensation in stops
    pub exposure_ev: f32,
    /// Shutter time in seconds
    pub shutter_s: f32,
    /// Sensor sensitivity
    pub iso: f32,
    /// Aperture f-number
    pub aperture_f: f32,
    /// Focal length in millimeters
    pub focal_length_mm: f32,
    /// Focus distance in meters
    pub focus_distance_m: f32,
    /// Radial distortion (-1 pincushion .. 1 barrel)
    pub distortion: f32,
    /// Vignette strength
    pub vignette: f32,
    /// Chromatic aberration amount
    pub chromatic_aberration: f32,
    /// White balance temperature (-1 cool .. 1 warm)
    pub wb_temperature: f32,
    /// White balance tint (-1 green .. 1 magenta)
    pub wb_tint: f32,
    /// Contrast multiplier around mid-gray
    pub contrast: f32,
    /// Saturation multiplier
    pub saturation: f32,
    /// Unsharp mask amount
    pub sharpen: f32,
    /// Noise reduction amount
    pub noise_reduction: f32,
    /// Apply the filmic tone curve
    pub tone_map: bool,
    /// Horizontal lens shift
    pub lens_shift_x: f32,
    /// Vertical lens shift
    pub lens_shift_y: f32,
    /// Supersampling factor
    pub upscale_factor: f32,
    /// Upscale resampling style
    pub upscale_style: UpscaleStyle,
    /// Fraction of the source resolution processed for the preview
    pub preview_scale: f32,
    /// What the composite shows
    pub preview_mode: PreviewMode,
    /// Normalized divider position for split mode
    pub split_position: f32,
    /// View sampled by the histogram
    pub histogram_mode: HistogramMode,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            exposure_ev: 0.0,
            shutter_s: 1.0 / 125.0,
            iso: 100.0,
            aperture_f: 5.6,
            focal_length_mm: 35.0,
            focus_distance_m: 3.0,
            distortion: 0.0,
            vignette: 0.0,
            chromatic_aberration: 0.0,
            wb_temperature: 0.0,
            wb_tint: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpen: 0.0,
            noise_reduction: 0.0,
            tone_map: false,
            lens_shift_x: 0.0,
            lens_shift_y: 0.0,
            upscale_factor: 1.0,
            upscale_style: UpscaleStyle::Smooth,
            preview_scale: 1.0,
            preview_mode: PreviewMode::Split,
            split_position: 0.5,
            histogram_mode: HistogramMode::Composite,
        }
    }
}

impl ParameterSet {
    /// Settings under which every stage is an identity transform
    ///
    /// Widest focal length (no zoom), smallest aperture (no defocus), base ISO
    /// and a fast shutter; processed-only preview.
    pub fn neutral() -> Self {
        Self {
            aperture_f: ranges::APERTURE_F.1,
            focal_length_mm: ranges::FOCAL_LENGTH_MM.0,
            shutter_s: 1.0 / 1000.0,
            preview_mode: PreviewMode::Processed,
            ..Default::default()
        }
    }

    /// Return a copy with every field clamped to its documented range
    ///
    /// Non-finite values fall back to the field default.
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        let c = |v: f32, (lo, hi): (f32, f32), fallback: f32| {
            if v.is_finite() { v.clamp(lo, hi) } else { fallback }
        };

        let upscale = c(self.upscale_factor, ranges::UPSCALE_FACTOR, d.upscale_factor);
        let upscale = (upscale / ranges::UPSCALE_STEP).round() * ranges::UPSCALE_STEP;

        Self {
            exposure_ev: c(self.exposure_ev, ranges::EXPOSURE_EV, d.exposure_ev),
            shutter_s: c(self.shutter_s, ranges::SHUTTER_S, d.shutter_s),
            iso: c(self.iso, ranges::ISO, d.iso),
            aperture_f: c(self.aperture_f, ranges::APERTURE_F, d.aperture_f),
            focal_length_mm: c(self.focal_length_mm, ranges::FOCAL_LENGTH_MM, d.focal_length_mm),
            focus_distance_m: c(
                self.focus_distance_m,
                ranges::FOCUS_DISTANCE_M,
                d.focus_distance_m,
            ),
            distortion: c(self.distortion, ranges::SIGNED_UNIT, d.distortion),
            vignette: c(self.vignette, ranges::UNIT, d.vignette),
            chromatic_aberration: c(
                self.chromatic_aberration,
                ranges::UNIT,
                d.chromatic_aberration,
            ),
            wb_temperature: c(self.wb_temperature, ranges::SIGNED_UNIT, d.wb_temperature),
            wb_tint: c(self.wb_tint, ranges::SIGNED_UNIT, d.wb_tint),
            contrast: c(self.contrast, ranges::GRADE, d.contrast),
            saturation: c(self.saturation, ranges::GRADE, d.saturation),
            sharpen: c(self.sharpen, ranges::UNIT, d.sharpen),
            noise_reduction: c(self.noise_reduction, ranges::UNIT, d.noise_reduction),
            tone_map: self.tone_map,
            lens_shift_x: c(self.lens_shift_x, ranges::SIGNED_UNIT, d.lens_shift_x),
            lens_shift_y: c(self.lens_shift_y, ranges::SIGNED_UNIT, d.lens_shift_y),
            upscale_factor: upscale,
            upscale_style: self.upscale_style,
            preview_scale: c(self.preview_scale, ranges::PREVIEW_SCALE, d.preview_scale),
            preview_mode: self.preview_mode,
            split_position: c(self.split_position, ranges::UNIT, d.split_position),
            histogram_mode: self.histogram_mode,
        }
    }

    /// Multiplicative exposure gain (2^EV)
    pub fn exposure_gain(&self) -> f32 {
        self.exposure_ev.exp2()
    }

    /// Log-ratio shutter normalization: 0 at or below 1/60 s, 1 at 1 s
    pub fn shutter_norm(&self) -> f32 {
        let s = self.shutter_s.max(ranges::SHUTTER_S.0);
        let span = (ranges::SHUTTER_BLUR_FULL_S / ranges::SHUTTER_BLUR_START_S).ln();
        ((s / ranges::SHUTTER_BLUR_START_S).ln() / span).clamp(0.0, 1.0)
    }

    /// Linear-clamp aperture normalization: 1 at the widest aperture
    pub fn aperture_norm(&self) -> f32 {
        let (lo, hi) = ranges::APERTURE_F;
        ((hi - self.aperture_f) / (hi - lo)).clamp(0.0, 1.0)
    }

    /// Linear-clamp ISO normalization
    pub fn iso_norm(&self) -> f32 {
        linear_norm(self.iso, ranges::ISO)
    }

    /// Linear-clamp focal length normalization
    pub fn focal_norm(&self) -> f32 {
        linear_norm(self.focal_length_mm, ranges::FOCAL_LENGTH_MM)
    }

    /// Focus plane scalar from the linear-clamped focus distance
    pub fn focus_plane(&self) -> f32 {
        linear_norm(self.focus_distance_m, ranges::FOCUS_DISTANCE_M)
    }
}

fn linear_norm(value: f32, (lo, hi): (f32, f32)) -> f32 {
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Documented range of one numeric parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterRange {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParameterRange {
    const fn new(name: &'static str, (min, max): (f32, f32), default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Range table for every numeric field of [`ParameterSet`]
pub const PARAMETER_RANGES: [ParameterRange; 20] = [
    ParameterRange::new("exposure_ev", ranges::EXPOSURE_EV, 0.0),
    ParameterRange::new("shutter_s", ranges::SHUTTER_S, 1.0 / 125.0),
    ParameterRange::new("iso", ranges::ISO, 100.0),
    ParameterRange::new("aperture_f", ranges::APERTURE_F, 5.6),
    ParameterRange::new("focal_length_mm", ranges::FOCAL_LENGTH_MM, 35.0),
    ParameterRange::new("focus_distance_m", ranges::FOCUS_DISTANCE_M, 3.0),
    ParameterRange::new("distortion", ranges::SIGNED_UNIT, 0.0),
    ParameterRange::new("vignette", ranges::UNIT, 0.0),
    ParameterRange::new("chromatic_aberration", ranges::UNIT, 0.0),
    ParameterRange::new("wb_temperature", ranges::SIGNED_UNIT, 0.0),
    ParameterRange::new("wb_tint", ranges::SIGNED_UNIT, 0.0),
    ParameterRange::new("contrast", ranges::GRADE, 1.0),
    ParameterRange::new("saturation", ranges::GRADE, 1.0),
    ParameterRange::new("sharpen", ranges::UNIT, 0.0),
    ParameterRange::new("noise_reduction", ranges::UNIT, 0.0),
    ParameterRange::new("lens_shift_x", ranges::SIGNED_UNIT, 0.0),
    ParameterRange::new("lens_shift_y", ranges::SIGNED_UNIT, 0.0),
    ParameterRange::new("upscale_factor", ranges::UPSCALE_FACTOR, 1.0),
    ParameterRange::new("preview_scale", ranges::PREVIEW_SCALE, 1.0),
    ParameterRange::new("split_position", ranges::UNIT, 0.5),
];
