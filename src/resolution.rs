// SPDX-License-Identifier: GPL-3.0-only

//! Processing resolution governor
//!
//! Sizes the ping-pong buffers from the source size, the requested upscale
//! factor and the preview scale, then applies two uniform downscales so the
//! result never exceeds the device texture limit or the pixel budget.

use crate::config::GovernorConfig;
use std::fmt;
use tracing::debug;

/// Width and height of a processing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Longest side
    pub fn max_side(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Largest size with this aspect ratio that fits inside `bounds`
    pub fn contain_within(&self, bounds: Resolution) -> Resolution {
        let (w, h) = (self.width.max(1) as f64, self.height.max(1) as f64);
        let scale = (bounds.width.max(1) as f64 / w).min(bounds.height.max(1) as f64 / h);
        Resolution::new(
            ((w * scale).round() as u32).clamp(1, bounds.width.max(1)),
            ((h * scale).round() as u32).clamp(1, bounds.height.max(1)),
        )
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Computes processing resolutions within device and memory ceilings
#[derive(Debug, Clone, Copy)]
pub struct ResolutionGovernor {
    max_dimension: u32,
    pixel_budget: u64,
}

impl ResolutionGovernor {
    /// Create a governor for a device with the given 2D texture limit
    ///
    /// The dimension ceiling is the device limit clamped to the configured
    /// range, and never above the device limit itself.
    pub fn new(device_max_texture: u32, config: &GovernorConfig) -> Self {
        let device_max_texture = device_max_texture.max(1);
        let max_dimension = device_max_texture
            .clamp(config.min_ceiling, config.max_ceiling)
            .min(device_max_texture);

        debug!(
            device_max_texture,
            max_dimension,
            pixel_budget = config.pixel_budget,
            "Resolution governor configured"
        );

        Self {
            max_dimension,
            pixel_budget: config.pixel_budget.max(1),
        }
    }

    /// Longest side any processing surface may have
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Largest pixel count any processing surface may have
    pub fn pixel_budget(&self) -> u64 {
        self.pixel_budget
    }

    /// Processing resolution for a source at the given upscale and preview scale
    pub fn compute(
        &self,
        source_width: u32,
        source_height: u32,
        upscale_factor: f32,
        preview_scale: f32,
    ) -> Resolution {
        let factor = sanitize_scale(upscale_factor) * sanitize_scale(preview_scale);
        let w = (source_width.max(1) as f64 * factor as f64).round().max(1.0);
        let h = (source_height.max(1) as f64 * factor as f64).round().max(1.0);
        self.fit_dims(w, h)
    }

    /// Clamp an explicit target (e.g. a snapshot export size) to the limits
    pub fn fit(&self, target: Resolution) -> Resolution {
        self.fit_dims(target.width.max(1) as f64, target.height.max(1) as f64)
    }

    fn fit_dims(&self, mut w: f64, mut h: f64) -> Resolution {
        // Clamp 1: longest side to the device-bound ceiling
        let ceiling = self.max_dimension as f64;
        let longest = w.max(h);
        if longest > ceiling {
            let scale = ceiling / longest;
            w = (w * scale).round().clamp(1.0, ceiling);
            h = (h * scale).round().clamp(1.0, ceiling);
        }

        // Clamp 2: pixel budget; flooring keeps the product under budget
        let budget = self.pixel_budget as f64;
        if w * h > budget {
            let scale = (budget / (w * h)).sqrt();
            w = (w * scale).floor().max(1.0);
            h = (h * scale).floor().max(1.0);
        }

        Resolution::new(w as u32, h as u32)
    }
}

fn sanitize_scale(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor(device_limit: u32) -> ResolutionGovernor {
        ResolutionGovernor::new(device_limit, &GovernorConfig::default())
    }

    #[test]
    fn test_display_uses_ascii_separator() {
        assert_eq!(Resolution::new(1920, 1080).to_string(), "1920x1080");
    }

    #[test]
    fn test_identity_when_within_limits() {
        let g = governor(8192);
        assert_eq!(g.compute(1920, 1080, 1.0, 1.0), Resolution::new(1920, 1080));
        assert_eq!(g.compute(1920, 1080, 2.0, 0.5), Resolution::new(1920, 1080));
    }

    #[test]
    fn test_ceiling_clamped_to_range() {
        assert_eq!(governor(16384).max_dimension(), 8192);
        assert_eq!(governor(4096).max_dimension(), 4096);
        // Never above what the device supports
        assert_eq!(governor(1024).max_dimension(), 1024);
    }

    #[test]
    fn test_dimension_clamp_preserves_aspect() {
        let g = governor(4096);
        let r = g.compute(4000, 2000, 2.0, 1.0);
        assert_eq!(r, Resolution::new(4096, 2048));
    }

    #[test]
    fn test_pixel_budget_clamp() {
        let config = GovernorConfig {
            pixel_budget: 1_000_000,
            ..Default::default()
        };
        let g = ResolutionGovernor::new(8192, &config);
        let r = g.compute(2000, 1000, 1.0, 1.0);
        assert!(r.pixels() <= 1_000_000);
        let aspect = r.width as f64 / r.height as f64;
        assert!((aspect - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_never_below_one_pixel() {
        let g = governor(8192);
        assert_eq!(g.compute(0, 0, 1.0, 0.25), Resolution::new(1, 1));
        assert_eq!(g.compute(100_000, 1, 1.0, 1.0).height, 1);
    }

    #[test]
    fn test_contain_within() {
        let src = Resolution::new(4000, 3000);
        assert_eq!(src.contain_within(Resolution::new(1920, 1080)), Resolution::new(1440, 1080));
        assert_eq!(src.contain_within(Resolution::new(800, 800)), Resolution::new(800, 600));
    }

    #[test]
    fn test_non_finite_scale_treated_as_one() {
        let g = governor(8192);
        assert_eq!(g.compute(640, 480, f32::NAN, 1.0), Resolution::new(640, 480));
    }
}
