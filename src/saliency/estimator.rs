// SPDX-License-Identifier: GPL-3.0-only

//! Gradient-based subject estimator
//!
//! Works on a small downsampled frame:
//!
//! 1. decode to linear luminance
//! 2. salience = gradient magnitude weighted by a Gaussian center bias
//! 3. salience-weighted centroid
//! 4. threshold the interior at `mean + 0.35 * (max - mean)`
//! 5. too few selected pixels: fixed box around the centroid
//! 6. otherwise the padded bounding box of the selection core (selected
//!    pixels no farther from the centroid than their weighted mean distance)
//! 7. backlight check against a ring around the box
//! 8. off-center distance of the centroid
//!
//! The center bias assumes centered content is more likely the subject. It
//! misidentifies strongly off-center subjects and is kept that way.

use super::types::{FrameRegion, SubjectContext, SubjectSource};
use crate::color::{luminance_srgb8, smoothstep};
use crate::constants::saliency::*;
use crate::frame::DownsampledFrame;
use tracing::trace;

/// Estimator with reusable scratch buffers
#[derive(Debug, Default)]
pub struct SaliencyEstimator {
    luminance: Vec<f32>,
    salience: Vec<f32>,
}

impl SaliencyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate the subject of a downsampled frame
    ///
    /// Always returns a usable context; featureless frames yield
    /// [`SubjectContext::default`].
    pub fn estimate(&mut self, frame: &DownsampledFrame) -> SubjectContext {
        let w = frame.width as usize;
        let h = frame.height as usize;
        if w < 3 || h < 3 || frame.rgba.len() < w * h * 4 {
            return SubjectContext::default();
        }

        self.luminance.clear();
        self.luminance.extend(
            frame
                .rgba
                .chunks_exact(4)
                .take(w * h)
                .map(|px| luminance_srgb8(px[0], px[1], px[2])),
        );
        self.salience.clear();
        self.salience.resize(w * h, 0.0);

        let lum = &self.luminance;
        let sal = &mut self.salience;

        // Center bias in pixel units
        let mid_x = (w as f32 - 1.0) * 0.5;
        let mid_y = (h as f32 - 1.0) * 0.5;
        let half_diagonal = 0.5 * ((w * w + h * h) as f32).sqrt();
        let sigma = CENTER_BIAS_SIGMA * half_diagonal;
        let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);

        let mut total = 0.0f32;
        let mut sum_x = 0.0f32;
        let mut sum_y = 0.0f32;
        let mut max = 0.0f32;

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let i = y * w + x;
                let l = lum[i];
                let gx = (lum[i + 1] - l) + (l - lum[i - 1]);
                let gy = (lum[i + w] - l) + (l - lum[i - w]);
                let magnitude = (gx * gx + gy * gy).sqrt();

                let dx = x as f32 - mid_x;
                let dy = y as f32 - mid_y;
                let bias = (-(dx * dx + dy * dy) * inv_two_sigma_sq).exp();

                let s = magnitude * bias;
                sal[i] = s;
                total += s;
                sum_x += s * (x as f32 + 0.5);
                sum_y += s * (y as f32 + 0.5);
                max = max.max(s);
            }
        }

        if total < SALIENCE_EPSILON {
            trace!("Featureless frame, using default subject");
            return SubjectContext::default();
        }

        let center_x = (sum_x / total / w as f32).clamp(0.0, 1.0);
        let center_y = (sum_y / total / h as f32).clamp(0.0, 1.0);

        let interior_count = ((w - 2) * (h - 2)) as f32;
        let mean = total / interior_count;
        let threshold = mean + THRESHOLD_FACTOR * (max - mean);

        // Selection count plus the salience-weighted mean distance of the
        // selection from the centroid
        let centroid_px = (center_x * w as f32, center_y * h as f32);
        let distance = |x: usize, y: usize| {
            (x as f32 + 0.5 - centroid_px.0).hypot(y as f32 + 0.5 - centroid_px.1)
        };
        let mut selected = 0usize;
        let (mut selected_weight, mut weighted_distance) = (0.0f32, 0.0f32);
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let s = sal[y * w + x];
                if s > threshold {
                    selected += 1;
                    selected_weight += s;
                    weighted_distance += s * distance(x, y);
                }
            }
        }
        let core_radius = weighted_distance / selected_weight.max(SALIENCE_EPSILON);

        // Box over the core of the selection. Nested contours (a bright ring
        // around a dark center) keep only the inner one.
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0usize, 0usize);
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                if sal[y * w + x] > threshold && distance(x, y) <= core_radius {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        let min_selected =
            MIN_SELECTED_PIXELS.max((MIN_SELECTED_FRACTION * (w * h) as f32).ceil() as usize);

        let (bbox, source) = if selected < min_selected || min_x > max_x {
            let side = FALLBACK_HALF_EXTENT * 2.0;
            (
                FrameRegion::centered(center_x, center_y, side, side).contained(),
                SubjectSource::Fallback,
            )
        } else {
            let raw = FrameRegion::from_pixels(
                min_x as u32,
                min_y as u32,
                (max_x - min_x + 1) as u32,
                (max_y - min_y + 1) as u32,
                w as u32,
                h as u32,
            );
            let padded = FrameRegion::new(
                raw.x - raw.width * BOX_PADDING,
                raw.y - raw.height * BOX_PADDING,
                raw.width * (1.0 + 2.0 * BOX_PADDING),
                raw.height * (1.0 + 2.0 * BOX_PADDING),
            );
            (padded.clipped().contained(), SubjectSource::Detected)
        };

        // Box and ring statistics, membership by pixel center
        let ring_region = bbox.expanded(BACKLIGHT_EXPANSION).clipped();
        let (mut box_lum, mut box_sal, mut box_count) = (0.0f32, 0.0f32, 0usize);
        let (mut ring_lum, mut ring_count) = (0.0f32, 0usize);
        for y in 0..h {
            let ny = (y as f32 + 0.5) / h as f32;
            for x in 0..w {
                let nx = (x as f32 + 0.5) / w as f32;
                let i = y * w + x;
                if bbox.contains(nx, ny) {
                    box_lum += lum[i];
                    box_sal += sal[i];
                    box_count += 1;
                } else if ring_region.contains(nx, ny) {
                    ring_lum += lum[i];
                    ring_count += 1;
                }
            }
        }

        let brightness = box_lum / box_count.max(1) as f32;
        let sharpness = (box_sal / box_count.max(1) as f32 / SHARPNESS_NORMALIZER).clamp(0.0, 1.0);
        let area_ratio = bbox.area();

        let backlit = ring_count > 0 && {
            let ring_mean = ring_lum / ring_count as f32;
            ring_mean - brightness > BACKLIGHT_MARGIN && brightness < BACKLIGHT_SUBJECT_MAX
        };

        let off_center = (((center_x - 0.5).powi(2) + (center_y - 0.5).powi(2)).sqrt()
            / std::f32::consts::FRAC_1_SQRT_2)
            .clamp(0.0, 1.0);

        let confidence = subject_confidence(sharpness, area_ratio);

        let context = SubjectContext {
            center_x,
            center_y,
            bbox,
            brightness,
            sharpness,
            area_ratio,
            off_center,
            backlit,
            confidence,
            strength: confidence.max(STRENGTH_FLOOR),
            source,
        };

        trace!(
            cx = context.center_x,
            cy = context.center_y,
            selected,
            confidence,
            backlit,
            ?source,
            "Subject estimated"
        );

        context
    }
}

/// Confidence from in-box sharpness and how plausible the box area is
pub fn subject_confidence(sharpness: f32, area_ratio: f32) -> f32 {
    let area_score = smoothstep(AREA_RISE.0, AREA_RISE.1, area_ratio)
        * (1.0 - smoothstep(AREA_FALL.0, AREA_FALL.1, area_ratio));
    (CONFIDENCE_SHARPNESS_WEIGHT * sharpness + CONFIDENCE_AREA_WEIGHT * area_score).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from_fn(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> DownsampledFrame {
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = f(x, y);
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        DownsampledFrame {
            width: w,
            height: h,
            rgba,
        }
    }

    #[test]
    fn test_flat_frame_returns_default() {
        let frame = frame_from_fn(64, 48, |_, _| 128);
        let ctx = SaliencyEstimator::new().estimate(&frame);
        assert_eq!(ctx, SubjectContext::default());
    }

    #[test]
    fn test_tiny_frame_returns_default() {
        let frame = frame_from_fn(2, 2, |x, _| if x == 0 { 0 } else { 255 });
        assert_eq!(
            SaliencyEstimator::new().estimate(&frame).source,
            SubjectSource::Default
        );
    }

    #[test]
    fn test_few_salient_pixels_use_fallback_box() {
        // A single bright pixel produces a handful of gradient pixels
        let frame = frame_from_fn(128, 128, |x, y| if (x, y) == (70, 60) { 255 } else { 0 });
        let ctx = SaliencyEstimator::new().estimate(&frame);
        assert_eq!(ctx.source, SubjectSource::Fallback);
        assert!((ctx.bbox.width - 0.4).abs() < 1e-5);
        assert!((ctx.bbox.height - 0.4).abs() < 1e-5);
        assert!(ctx.bbox.contains(ctx.center_x, ctx.center_y));
    }

    #[test]
    fn test_box_stays_inside_frame() {
        let frame = frame_from_fn(96, 64, |x, y| if x < 20 && y < 20 { 255 } else { 10 });
        let ctx = SaliencyEstimator::new().estimate(&frame);
        let b = ctx.bbox;
        assert!(b.x >= 0.0 && b.y >= 0.0);
        assert!(b.x + b.width <= 1.0 + 1e-5);
        assert!(b.y + b.height <= 1.0 + 1e-5);
        assert!(b.area() > 0.0);
    }

    #[test]
    fn test_strength_has_floor_for_estimates() {
        let frame = frame_from_fn(128, 128, |x, y| {
            if (44..84).contains(&x) && (44..84).contains(&y) { 230 } else { 20 }
        });
        let ctx = SaliencyEstimator::new().estimate(&frame);
        assert_eq!(ctx.source, SubjectSource::Detected);
        assert!(ctx.strength >= STRENGTH_FLOOR);
        assert!(ctx.strength >= ctx.confidence);
    }

    #[test]
    fn test_box_keeps_inner_contour_of_ring() {
        let frame = frame_from_fn(128, 128, |x, y| {
            let inner = (48..80).contains(&x) && (48..80).contains(&y);
            let outer = (34..94).contains(&x) && (34..94).contains(&y);
            if outer && !inner { 230 } else { 20 }
        });
        let ctx = SaliencyEstimator::new().estimate(&frame);
        assert_eq!(ctx.source, SubjectSource::Detected);
        // Inner square spans 0.375..0.625; the outer ring edge starts at 0.266
        assert!(ctx.bbox.x > 0.3 && ctx.bbox.x < 0.375);
        assert!(ctx.bbox.x + ctx.bbox.width < 0.7);
        assert!(ctx.brightness < 0.6);
        assert!(ctx.backlit);
    }

    #[test]
    fn test_confidence_prefers_moderate_areas() {
        assert!(subject_confidence(0.5, 0.2) > subject_confidence(0.5, 0.001));
        assert!(subject_confidence(0.5, 0.2) > subject_confidence(0.5, 0.99));
    }
}
