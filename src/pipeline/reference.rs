// SPDX-License-Identifier: GPL-3.0-only

//! CPU reference pipeline
//!
//! A per-pixel mirror of the WGSL stages, driven by the same [`StageUniforms`]
//! the GPU receives. Sampling follows the GPU convention (texel centers at
//! `(i + 0.5) / size`, clamp-to-edge). Stage images hold what the surfaces
//! hold: sRGB-encoded values quantized to 8 bits, decoded after sampling.
//! Used for tests and as the readable statement of the stage math.

use super::stages::{StageDims, StageUniforms};
use crate::color::{linear_to_srgb, luminance, smoothstep, srgb_to_linear};
use crate::constants::{effects, lens};
use crate::errors::EngineResult;
use crate::frame::{FrameSource, validate_source};
use crate::params::{ParameterSet, UpscaleStyle};
use crate::saliency::SubjectContext;
use crate::shaders::common::{CompositeParams, EffectsParams, InputParams, LensParams};

/// Texture filtering used when sampling an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Linear,
    Nearest,
}

impl From<UpscaleStyle> for Filter {
    fn from(style: UpscaleStyle) -> Self {
        match style {
            UpscaleStyle::Smooth => Filter::Linear,
            UpscaleStyle::Crisp => Filter::Nearest,
        }
    }
}

/// Three-channel float image; holds either encoded or linear values
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 3]>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; width as usize * height as usize],
        }
    }

    /// Unit-range values of tightly packed RGBA8 pixels (no decoding)
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> Self {
        let pixels = rgba
            .chunks_exact(4)
            .map(|px| {
                [
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                ]
            })
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f32; 3] {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32, value: [f32; 3]) {
        let i = y as usize * self.width as usize + x as usize;
        self.pixels[i] = value;
    }

    /// Sample at normalized coordinates with clamp-to-edge addressing
    pub fn sample(&self, u: f32, v: f32, filter: Filter) -> [f32; 3] {
        let (w, h) = (self.width as i64, self.height as i64);
        let clamp_x = |i: i64| i.clamp(0, w - 1) as u32;
        let clamp_y = |i: i64| i.clamp(0, h - 1) as u32;

        match filter {
            Filter::Nearest => {
                let x = (u * w as f32).floor() as i64;
                let y = (v * h as f32).floor() as i64;
                self.get(clamp_x(x), clamp_y(y))
            }
            Filter::Linear => {
                let x = u * w as f32 - 0.5;
                let y = v * h as f32 - 0.5;
                let (x0, y0) = (x.floor(), y.floor());
                let (fx, fy) = (x - x0, y - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);

                let p00 = self.get(clamp_x(x0), clamp_y(y0));
                let p10 = self.get(clamp_x(x0 + 1), clamp_y(y0));
                let p01 = self.get(clamp_x(x0), clamp_y(y0 + 1));
                let p11 = self.get(clamp_x(x0 + 1), clamp_y(y0 + 1));

                std::array::from_fn(|c| {
                    let top = p00[c] + (p10[c] - p00[c]) * fx;
                    let bottom = p01[c] + (p11[c] - p01[c]) * fx;
                    top + (bottom - top) * fy
                })
            }
        }
    }

    /// Copy with every value decoded from sRGB to linear light
    pub fn decoded(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|p| p.map(srgb_to_linear)).collect(),
        }
    }

    /// Mean Rec. 709 luma of the (linear) image
    pub fn mean_luminance(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .pixels
            .iter()
            .map(|p| luminance(p[0], p[1], p[2]) as f64)
            .sum();
        (sum / self.pixels.len() as f64) as f32
    }
}

/// Output of one reference render
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFrame {
    /// Effects output decoded to linear light (processing size)
    pub processed: RgbImage,
    /// Composited RGBA8 output (output size)
    pub output: Vec<u8>,
}

/// CPU mirror of [`super::Pipeline`] at fixed surface sizes
#[derive(Debug, Clone, Copy)]
pub struct ReferencePipeline {
    dims: StageDims,
}

impl ReferencePipeline {
    pub fn new(dims: StageDims) -> Self {
        Self { dims }
    }

    pub fn render(
        &self,
        source: &dyn FrameSource,
        params: &ParameterSet,
        subject: &SubjectContext,
        frame_index: u32,
    ) -> EngineResult<ReferenceFrame> {
        validate_source(source)?;
        let (width, height) = (source.width(), source.height());

        let uniforms = StageUniforms::derive(params, subject, self.dims, frame_index);
        let original = RgbImage::from_rgba8(width, height, source.pixels());

        let exposed = input_stage(&original, &uniforms.input, params.upscale_style.into());
        let lensed = lens_stage(&exposed, &uniforms.lens);
        let graded = effects_stage(&lensed, &uniforms.effects);
        let output = composite_stage(&original, &graded, &uniforms.composite);

        Ok(ReferenceFrame {
            processed: graded.decoded(),
            output,
        })
    }
}

/// Round a unit-range value to the nearest 8-bit code
#[inline]
fn quantize(v: f32) -> f32 {
    (v.clamp(0.0, 1.0) * 255.0).round() / 255.0
}

/// Encode linear light and quantize like a write to a working surface
#[inline]
fn store(c: [f32; 3]) -> [f32; 3] {
    c.map(|v| quantize(linear_to_srgb(v)))
}

/// Linear light of a working surface sample
#[inline]
fn fetch(img: &RgbImage, u: f32, v: f32) -> [f32; 3] {
    img.sample(u, v, Filter::Linear).map(srgb_to_linear)
}

#[inline]
fn pixel_uv(x: u32, y: u32, width: u32, height: u32) -> (f32, f32) {
    (
        (x as f32 + 0.5) / width as f32,
        (y as f32 + 0.5) / height as f32,
    )
}

fn for_each_pixel(
    width: u32,
    height: u32,
    mut shade: impl FnMut(u32, u32, f32, f32) -> [f32; 3],
) -> RgbImage {
    let mut out = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (u, v) = pixel_uv(x, y, width, height);
            out.set(x, y, store(shade(x, y, u, v)));
        }
    }
    out
}

pub fn input_stage(source: &RgbImage, p: &InputParams, filter: Filter) -> RgbImage {
    for_each_pixel(p.width, p.height, |_, _, u, v| {
        source
            .sample(u, v, filter)
            .map(|c| (srgb_to_linear(c) * p.exposure_gain).max(0.0) / p.headroom)
    })
}

pub fn lens_stage(input: &RgbImage, p: &LensParams) -> RgbImage {
    let aspect = p.width as f32 / p.height as f32;
    for_each_pixel(p.width, p.height, |_, _, u, v| {
        let px = (u - p.lens_center_x) * aspect;
        let py = v - p.lens_center_y;
        let r2 = px * px + py * py;
        let (dx, dy) = (px + px * r2 * p.distortion_k, py + py * r2 * p.distortion_k);
        let (zx, zy) = (dx / p.zoom, dy / p.zoom);
        let base_u = p.lens_center_x + zx / aspect;
        let base_v = p.lens_center_y + zy;

        let r = (zx * zx + zy * zy).sqrt();
        let inv = 1.0 / r.max(lens::CENTER_EPSILON);
        let fringe_u = zx * inv * p.ca_offset * r / aspect;
        let fringe_v = zy * inv * p.ca_offset * r;

        let red = fetch(input, base_u + fringe_u, base_v + fringe_v)[0];
        let green = fetch(input, base_u, base_v)[1];
        let blue = fetch(input, base_u - fringe_u, base_v - fringe_v)[2];

        let dist = ((u - p.focus_center_x).powi(2) + (v - p.focus_center_y).powi(2)).sqrt();
        let shade = 1.0
            - p.vignette_strength * smoothstep(lens::VIGNETTE_INNER, lens::VIGNETTE_OUTER, dist);
        [red * shade, green * shade, blue * shade]
    })
}

fn cross_blur(
    sample: &impl Fn(f32, f32) -> [f32; 3],
    u: f32,
    v: f32,
    radius_px: f32,
    (tu, tv): (f32, f32),
) -> [f32; 3] {
    let ring = |r: f32| {
        let taps = [
            sample(u + tu * r, v),
            sample(u - tu * r, v),
            sample(u, v + tv * r),
            sample(u, v - tv * r),
        ];
        std::array::from_fn::<f32, 3, _>(|c| taps.iter().map(|t| t[c]).sum())
    };
    let center = sample(u, v);
    let inner = ring(radius_px * 0.5);
    let outer = ring(radius_px);
    std::array::from_fn(|c| {
        center[c] * effects::KERNEL_CENTER_WEIGHT
            + inner[c] * effects::KERNEL_INNER_WEIGHT
            + outer[c] * effects::KERNEL_OUTER_WEIGHT
    })
}

fn tone_curve(x: f32) -> f32 {
    let v = x.max(0.0);
    let num = v * (effects::TONE_A * v + effects::TONE_B);
    let den = v * (effects::TONE_C * v + effects::TONE_D) + effects::TONE_E;
    (num / den).clamp(0.0, 1.0)
}

/// PCG integer hash, matching `pcg_hash` in the shaders
pub fn pcg_hash(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Uniform noise in [0, 1] keyed by pixel and frame
pub fn noise01(x: u32, y: u32, frame: u32) -> f32 {
    let h = pcg_hash(x ^ pcg_hash(y ^ pcg_hash(frame)));
    (h >> 8) as f32 / 16_777_215.0
}

pub fn effects_stage(input: &RgbImage, p: &EffectsParams) -> RgbImage {
    let (tu, tv) = (1.0 / p.width as f32, 1.0 / p.height as f32);
    // Linear light with the Input stage headroom undone
    let linear = |u: f32, v: f32| fetch(input, u, v).map(|c| c * p.headroom);
    for_each_pixel(p.width, p.height, |x, y, u, v| {
        let original = linear(u, v);

        let dist = ((u - p.focus_center_x).powi(2) + (v - p.focus_center_y).powi(2)).sqrt();
        let depth = (dist / effects::MAX_CENTER_DISTANCE).clamp(0.0, 1.0);
        let mut coc = (depth - p.focus_plane).abs();
        let inside_subject = u >= p.subject_x
            && u <= p.subject_x + p.subject_w
            && v >= p.subject_y
            && v <= p.subject_y + p.subject_h;
        if inside_subject {
            coc *= 1.0 - p.subject_protection;
        }

        let radius = p.motion_blur_px + coc * p.defocus_blur_px;
        let mut color = if radius > 0.0 {
            cross_blur(&linear, u, v, radius, (tu, tv))
        } else {
            original
        };

        if p.nr_blend > 0.0 {
            let smooth = cross_blur(&linear, u, v, effects::NOISE_REDUCTION_RADIUS_PX, (tu, tv));
            color = std::array::from_fn(|c| color[c] + (smooth[c] - color[c]) * p.nr_blend);
        }

        if p.sharpen_gain > 0.0 {
            let taps = [
                linear(u + tu, v),
                linear(u - tu, v),
                linear(u, v + tv),
                linear(u, v - tv),
            ];
            for c in 0..3 {
                let local_average = taps.iter().map(|t| t[c]).sum::<f32>() * 0.25;
                color[c] += (original[c] - local_average) * p.sharpen_gain;
            }
        }

        color = [color[0] * p.wb_r, color[1] * p.wb_g, color[2] * p.wb_b];

        if p.noise_amplitude > 0.0 {
            let n = (noise01(x, y, p.frame_index) - 0.5) * p.noise_amplitude;
            color = color.map(|c| c + n);
        }

        if p.tone_map != 0 {
            color = color.map(tone_curve);
        }

        color = color.map(|c| (c - effects::CONTRAST_PIVOT) * p.contrast + effects::CONTRAST_PIVOT);
        let l = luminance(color[0], color[1], color[2]);
        color.map(|c| l + (c - l) * p.saturation)
    })
}

/// Composite to RGBA8; both images hold encoded values
pub fn composite_stage(original: &RgbImage, processed: &RgbImage, p: &CompositeParams) -> Vec<u8> {
    let mut out = Vec::with_capacity(p.out_width as usize * p.out_height as usize * 4);
    for y in 0..p.out_height {
        for x in 0..p.out_width {
            let (u, v) = pixel_uv(x, y, p.out_width, p.out_height);
            let iu = (u - p.rect_x) / p.rect_w;
            let iv = (v - p.rect_y) / p.rect_h;

            let color = if (0.0..=1.0).contains(&iu) && (0.0..=1.0).contains(&iv) {
                let show_original = match p.mode {
                    0 => true,
                    1 => false,
                    _ => iu < p.split_position,
                };
                if show_original {
                    original.sample(iu, iv, Filter::Linear)
                } else {
                    processed.sample(iu, iv, Filter::Linear)
                }
            } else {
                [p.background_r, p.background_g, p.background_b]
            };

            let [r, g, b] = color.map(|c| (quantize(c) * 255.0).round() as u8);
            out.extend_from_slice(&[r, g, b, 255]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StaticFrame;
    use crate::params::PreviewMode;
    use crate::resolution::Resolution;
    use crate::saliency::{FrameRegion, SubjectSource};

    fn square_dims(n: u32) -> StageDims {
        StageDims {
            processing: Resolution::new(n, n),
            output: Resolution::new(n, n),
        }
    }

    fn checkerboard(n: u32) -> StaticFrame {
        let mut data = Vec::with_capacity((n * n * 4) as usize);
        for y in 0..n {
            for x in 0..n {
                let v = if (x + y) % 2 == 0 { 220 } else { 30 };
                data.extend_from_slice(&[v, v / 2 + 40, 255 - v, 255]);
            }
        }
        StaticFrame::new(n, n, data).unwrap()
    }

    /// Smooth sinusoidal texture with a 16 px period
    fn wave(n: u32) -> StaticFrame {
        let tau = std::f32::consts::TAU;
        let mut data = Vec::with_capacity((n * n * 4) as usize);
        for y in 0..n {
            for x in 0..n {
                let v = 128.0
                    + 50.0 * (tau * x as f32 / 16.0).sin()
                    + 50.0 * (tau * y as f32 / 16.0).sin();
                let v = v.round() as u8;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        StaticFrame::new(n, n, data).unwrap()
    }

    fn mean_abs_diff(a: &RgbImage, b: &RgbImage, region: FrameRegion) -> f32 {
        let mut sum = 0.0;
        let mut count = 0;
        for y in 0..a.height {
            for x in 0..a.width {
                let (u, v) = pixel_uv(x, y, a.width, a.height);
                if region.contains(u, v) {
                    let (pa, pb) = (a.get(x, y), b.get(x, y));
                    sum += (0..3).map(|c| (pa[c] - pb[c]).abs()).sum::<f32>();
                    count += 1;
                }
            }
        }
        sum / count as f32
    }

    #[test]
    fn test_no_nan_over_parameter_extremes() {
        let frame = checkerboard(24);
        let pipeline = ReferencePipeline::new(StageDims {
            processing: Resolution::new(24, 24),
            output: Resolution::new(32, 20),
        });

        let low = ParameterSet {
            exposure_ev: -5.0,
            shutter_s: 1.0 / 8000.0,
            iso: 100.0,
            aperture_f: 22.0,
            focal_length_mm: 14.0,
            focus_distance_m: 0.3,
            distortion: -1.0,
            wb_temperature: -1.0,
            wb_tint: -1.0,
            contrast: 0.0,
            saturation: 0.0,
            lens_shift_x: -1.0,
            lens_shift_y: -1.0,
            split_position: 0.0,
            ..Default::default()
        };
        let high = ParameterSet {
            exposure_ev: 5.0,
            shutter_s: 1.0,
            iso: 12800.0,
            aperture_f: 1.4,
            focal_length_mm: 200.0,
            focus_distance_m: 10.0,
            distortion: 1.0,
            vignette: 1.0,
            chromatic_aberration: 1.0,
            wb_temperature: 1.0,
            wb_tint: 1.0,
            contrast: 2.0,
            saturation: 2.0,
            sharpen: 1.0,
            noise_reduction: 1.0,
            tone_map: true,
            lens_shift_x: 1.0,
            lens_shift_y: 1.0,
            upscale_style: UpscaleStyle::Crisp,
            split_position: 1.0,
            ..Default::default()
        };

        let subject = SubjectContext {
            strength: 1.0,
            center_x: 1.0,
            center_y: 0.0,
            source: SubjectSource::Detected,
            ..Default::default()
        };

        for params in [ParameterSet::default(), ParameterSet::neutral(), low, high] {
            let frame_out = pipeline.render(&frame, &params, &subject, 3).unwrap();
            assert!(
                frame_out
                    .processed
                    .pixels
                    .iter()
                    .flatten()
                    .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
            );
            assert_eq!(frame_out.output.len(), 32 * 20 * 4);
        }
    }

    #[test]
    fn test_exposure_gain_is_exact() {
        let frame = StaticFrame::solid(16, 16, [100, 100, 100, 255]).unwrap();
        let pipeline = ReferencePipeline::new(square_dims(16));
        let subject = SubjectContext::default();

        let base = pipeline
            .render(&frame, &ParameterSet::neutral(), &subject, 0)
            .unwrap();
        let plus_one = ParameterSet {
            exposure_ev: 1.0,
            ..ParameterSet::neutral()
        };
        let brighter = pipeline.render(&frame, &plus_one, &subject, 0).unwrap();

        // EV 0 is identity up to the 8-bit surface
        let expected = srgb_to_linear(100.0 / 255.0);
        assert!((base.processed.mean_luminance() - expected).abs() < 1.0 / 255.0);

        let ratio = brighter.processed.mean_luminance() / base.processed.mean_luminance();
        assert!((ratio - 2.0).abs() < 0.05, "ratio was {}", ratio);
    }

    #[test]
    fn test_tone_map_separates_highlights_past_white() {
        // Left half sRGB 180, right half 240; both exceed 1.0 linear at EV +2
        let mut data = Vec::new();
        for _y in 0..2 {
            for x in 0..4 {
                let v = if x < 2 { 180 } else { 240 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let frame = StaticFrame::new(4, 2, data).unwrap();
        let pipeline = ReferencePipeline::new(StageDims {
            processing: Resolution::new(4, 2),
            output: Resolution::new(4, 2),
        });
        let bright = ParameterSet {
            exposure_ev: 2.0,
            ..ParameterSet::neutral()
        };
        let render = |tone_map| {
            let params = ParameterSet { tone_map, ..bright };
            let out = pipeline
                .render(&frame, &params, &SubjectContext::default(), 0)
                .unwrap()
                .output;
            (out[0], out[3 * 4])
        };

        let (low, high) = render(true);
        assert!(low < high, "tone mapped {} vs {}", low, high);
        assert!(high < 255);

        // Without the tone curve both clip
        assert_eq!(render(false), (255, 255));
    }

    #[test]
    fn test_split_extremes_select_one_image() {
        let frame = checkerboard(20);
        let pipeline = ReferencePipeline::new(square_dims(20));
        let subject = SubjectContext::default();
        let graded = ParameterSet {
            exposure_ev: 1.5,
            saturation: 0.3,
            ..Default::default()
        };

        let render = |mode, split| {
            let params = ParameterSet {
                preview_mode: mode,
                split_position: split,
                ..graded
            };
            pipeline.render(&frame, &params, &subject, 0).unwrap().output
        };

        let processed_only = render(PreviewMode::Processed, 0.5);
        let original_only = render(PreviewMode::Original, 0.5);
        assert_ne!(processed_only, original_only);
        assert_eq!(render(PreviewMode::Split, 0.0), processed_only);
        assert_eq!(render(PreviewMode::Split, 1.0), original_only);
    }

    #[test]
    fn test_original_mode_reproduces_source() {
        let frame = checkerboard(12);
        let pipeline = ReferencePipeline::new(square_dims(12));
        let params = ParameterSet {
            preview_mode: PreviewMode::Original,
            ..Default::default()
        };
        let out = pipeline
            .render(&frame, &params, &SubjectContext::default(), 0)
            .unwrap();
        assert_eq!(out.output, frame.pixels());
    }

    #[test]
    fn test_same_seed_is_pixel_identical() {
        let frame = checkerboard(16);
        let pipeline = ReferencePipeline::new(square_dims(16));
        let noisy = ParameterSet {
            iso: 6400.0,
            ..Default::default()
        };
        let subject = SubjectContext::default();

        let a = pipeline.render(&frame, &noisy, &subject, 42).unwrap();
        let b = pipeline.render(&frame, &noisy, &subject, 42).unwrap();
        let c = pipeline.render(&frame, &noisy, &subject, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.processed, c.processed);
    }

    #[test]
    fn test_subject_box_is_protected_from_defocus() {
        let frame = wave(32);
        let pipeline = ReferencePipeline::new(square_dims(32));
        let bbox = FrameRegion::new(0.3, 0.3, 0.4, 0.4);

        // Far focus plane puts the frame center far out of focus
        let shallow = ParameterSet {
            aperture_f: 1.4,
            focus_distance_m: 10.0,
            ..ParameterSet::neutral()
        };
        let sharp = pipeline
            .render(&frame, &ParameterSet::neutral(), &SubjectContext::default(), 0)
            .unwrap();

        let unprotected = SubjectContext {
            bbox,
            strength: 0.0,
            ..Default::default()
        };
        let protected = SubjectContext {
            strength: 1.0,
            source: SubjectSource::Detected,
            ..unprotected
        };

        let blurred = pipeline.render(&frame, &shallow, &unprotected, 0).unwrap();
        let kept = pipeline.render(&frame, &shallow, &protected, 0).unwrap();

        let blurred_change = mean_abs_diff(&blurred.processed, &sharp.processed, bbox);
        let kept_change = mean_abs_diff(&kept.processed, &sharp.processed, bbox);
        assert!(
            kept_change < blurred_change * 0.5,
            "protected {} vs unprotected {}",
            kept_change,
            blurred_change
        );
    }

    #[test]
    fn test_pcg_hash_matches_known_values() {
        assert_eq!(pcg_hash(0), 129_708_002);
        assert_eq!(pcg_hash(1), 2_831_084_092);
        assert_eq!(pcg_hash(12345), 4_099_845_390);
        let n = noise01(5, 9, 1);
        assert!((0.0..=1.0).contains(&n));
    }

    #[test]
    fn test_linear_sampling_hits_texel_centers_exactly() {
        let img = RgbImage::from_rgba8(2, 1, &[0, 0, 0, 255, 255, 255, 255, 255]);
        assert_eq!(img.sample(0.25, 0.5, Filter::Linear), [0.0; 3]);
        assert_eq!(img.sample(0.75, 0.5, Filter::Linear), [1.0; 3]);
        let mid = img.sample(0.5, 0.5, Filter::Linear);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert_eq!(img.sample(0.49, 0.5, Filter::Nearest), [0.0; 3]);
    }
}
