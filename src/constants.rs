// SPDX-License-Identifier: GPL-3.0-only

//! Calibration constants
//!
//! These values define the look of the simulation and the behavior of the
//! subject heuristic. They are matched by the WGSL stage shaders and the CPU
//! reference, so changing one here means changing it in the shader too.

use std::time::Duration;

/// Parameter ranges and normalization anchors
pub mod ranges {
    /// Exposure compensation in stops
    pub const EXPOSURE_EV: (f32, f32) = (-5.0, 5.0);

    /// Shutter time in seconds
    pub const SHUTTER_S: (f32, f32) = (1.0 / 8000.0, 1.0);

    /// Shutter time at or below which no motion blur is simulated
    pub const SHUTTER_BLUR_START_S: f32 = 1.0 / 60.0;

    /// Shutter time at which motion blur saturates
    pub const SHUTTER_BLUR_FULL_S: f32 = 1.0;

    /// Sensor sensitivity
    pub const ISO: (f32, f32) = (100.0, 12800.0);

    /// Aperture f-number
    pub const APERTURE_F: (f32, f32) = (1.4, 22.0);

    /// Focal length in millimeters
    pub const FOCAL_LENGTH_MM: (f32, f32) = (14.0, 200.0);

    /// Focus distance in meters
    pub const FOCUS_DISTANCE_M: (f32, f32) = (0.3, 10.0);

    /// Signed unit range used by distortion, white balance and lens shift
    pub const SIGNED_UNIT: (f32, f32) = (-1.0, 1.0);

    /// Unsigned unit range used by strengths and amounts
    pub const UNIT: (f32, f32) = (0.0, 1.0);

    /// Contrast and saturation multipliers
    pub const GRADE: (f32, f32) = (0.0, 2.0);

    /// Supersampling factor applied to the source
    pub const UPSCALE_FACTOR: (f32, f32) = (1.0, 4.0);

    /// Upscale factors are snapped to this step
    pub const UPSCALE_STEP: f32 = 0.5;

    /// Fraction of the source resolution used for the live preview
    pub const PREVIEW_SCALE: (f32, f32) = (0.25, 1.0);
}

/// Lens stage calibration
pub mod lens {
    /// Radial distortion coefficient at distortion = 1
    pub const DISTORTION_K_SCALE: f32 = 0.35;

    /// Zoom added at the long end of the focal range (zoom spans 1.0..=2.2)
    pub const ZOOM_RANGE: f32 = 1.2;

    /// Chromatic aberration offset per unit radius at amount = 1
    pub const CA_MAX_OFFSET: f32 = 0.012;

    /// Lens center displacement at full lens shift
    pub const LENS_SHIFT_RANGE: f32 = 0.2;

    /// The lens center never gets closer to a frame edge than this
    pub const LENS_CENTER_MARGIN: f32 = 0.1;

    /// Vignette falloff starts at this radius
    pub const VIGNETTE_INNER: f32 = 0.3;

    /// Vignette reaches full strength at this radius
    pub const VIGNETTE_OUTER: f32 = 0.9;

    /// Guard for normalizing vectors near the lens center
    pub const CENTER_EPSILON: f32 = 1e-5;
}

/// Effects stage calibration
pub mod effects {
    /// Blur radius in pixels contributed by the slowest shutter
    pub const MOTION_BLUR_MAX_PX: f32 = 3.0;

    /// Blur radius in pixels at full circle of confusion and widest aperture
    pub const DEFOCUS_BLUR_MAX_PX: f32 = 10.0;

    /// Radial distance from the focus center that maps to scene depth 1.0
    pub const MAX_CENTER_DISTANCE: f32 = std::f32::consts::FRAC_1_SQRT_2;

    /// Fraction of the CoC removed inside the subject box at full strength
    pub const SUBJECT_COC_PROTECTION: f32 = 0.9;

    /// Cross kernel weights: center, each inner tap (r/2), each outer tap (r)
    pub const KERNEL_CENTER_WEIGHT: f32 = 0.2;
    pub const KERNEL_INNER_WEIGHT: f32 = 0.12;
    pub const KERNEL_OUTER_WEIGHT: f32 = 0.08;

    /// Radius of the noise-reduction blur in pixels
    pub const NOISE_REDUCTION_RADIUS_PX: f32 = 2.5;

    /// Peak ISO noise amplitude at the highest ISO
    pub const ISO_NOISE_MAX: f32 = 0.12;

    /// Fraction of the noise amplitude removed at full noise reduction
    pub const NOISE_REDUCTION_SUPPRESSION: f32 = 0.7;

    /// Unsharp mask gain at sharpen = 1
    pub const SHARPEN_GAIN: f32 = 1.5;

    /// White balance gains per unit of temperature and tint
    pub const WB_TEMPERATURE_GAIN: f32 = 0.25;
    pub const WB_TINT_GAIN: f32 = 0.15;

    /// Contrast pivot (linear mid-gray)
    pub const CONTRAST_PIVOT: f32 = 0.18;

    /// Filmic tone curve coefficients: x(ax+b) / (x(cx+d)+e)
    pub const TONE_A: f32 = 2.51;
    pub const TONE_B: f32 = 0.03;
    pub const TONE_C: f32 = 2.43;
    pub const TONE_D: f32 = 0.59;
    pub const TONE_E: f32 = 0.14;

    /// Linear range the working surfaces carry into the tone curve. Input
    /// stores `linear / headroom`, Effects scales it back on fetch.
    pub const TONE_MAP_HEADROOM: f32 = 4.0;

    /// Rec. 709 luma weights
    pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];
}

/// Composite stage calibration
pub mod composite {
    /// Color outside the contained image (display-encoded)
    pub const BACKGROUND: [f32; 3] = [0.07, 0.07, 0.08];
}

/// Subject heuristic calibration
pub mod saliency {
    use super::Duration;

    /// Longest side of the frame handed to the estimator
    pub const MAX_DIMENSION: u32 = 128;

    /// Gaussian center-bias sigma as a fraction of the half diagonal
    pub const CENTER_BIAS_SIGMA: f32 = 0.38;

    /// Selection threshold: mean + factor * (max - mean)
    pub const THRESHOLD_FACTOR: f32 = 0.35;

    /// Minimum selected pixels before falling back to a fixed box
    pub const MIN_SELECTED_PIXELS: usize = 24;
    pub const MIN_SELECTED_FRACTION: f32 = 0.012;

    /// Fallback box half extent around the centroid
    pub const FALLBACK_HALF_EXTENT: f32 = 0.2;

    /// Padding added to each side of the selected bounding box, relative to its size
    pub const BOX_PADDING: f32 = 0.06;

    /// Smallest allowed box side (normalized)
    pub const MIN_BOX_SIZE: f32 = 0.05;

    /// Mean in-box salience that maps to sharpness 1.0
    pub const SHARPNESS_NORMALIZER: f32 = 0.25;

    /// Linear expansion of the subject box forming the backlight ring
    pub const BACKLIGHT_EXPANSION: f32 = 1.55;

    /// Ring must be this much brighter than the subject
    pub const BACKLIGHT_MARGIN: f32 = 0.11;

    /// Subject must be darker than this to count as backlit
    pub const BACKLIGHT_SUBJECT_MAX: f32 = 0.6;

    /// Total salience below this is treated as a featureless frame
    pub const SALIENCE_EPSILON: f32 = 1e-6;

    /// Confidence weights for sharpness and area plausibility
    pub const CONFIDENCE_SHARPNESS_WEIGHT: f32 = 0.65;
    pub const CONFIDENCE_AREA_WEIGHT: f32 = 0.35;

    /// Area ratios between these edges are plausible subjects
    pub const AREA_RISE: (f32, f32) = (0.01, 0.12);
    pub const AREA_FALL: (f32, f32) = (0.55, 0.95);

    /// Minimum blend strength of an estimated subject
    pub const STRENGTH_FLOOR: f32 = 0.2;

    /// Default cadence of the estimator clock
    pub const RECOMPUTE_INTERVAL: Duration = Duration::from_millis(250);
}

/// Histogram calibration
pub mod histogram {
    use super::Duration;

    /// Side of the square offscreen surface that is sampled
    pub const SAMPLE_SIZE: u32 = 128;

    /// Bins per channel
    pub const BINS: usize = 64;

    /// Default cadence of the histogram clock
    pub const RECOMPUTE_INTERVAL: Duration = Duration::from_millis(200);
}

/// Resolution governor limits
pub mod governor {
    /// Range the device-bound dimension ceiling is clamped to
    pub const MIN_CEILING: u32 = 2048;
    pub const MAX_CEILING: u32 = 8192;

    /// Maximum processing pixel count
    pub const PIXEL_BUDGET: u64 = 32_000_000;
}

/// GPU dispatch constants
pub mod gpu {
    /// Workgroup edge used by every stage shader (16x16 threads)
    pub const WORKGROUP_SIZE: u32 = 16;
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_kernel_weights_sum_to_one() {
        let sum = effects::KERNEL_CENTER_WEIGHT
            + 4.0 * effects::KERNEL_INNER_WEIGHT
            + 4.0 * effects::KERNEL_OUTER_WEIGHT;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_spans_wide_to_tele() {
        assert!((1.0 + lens::ZOOM_RANGE - 2.2).abs() < 1e-6);
    }
}
