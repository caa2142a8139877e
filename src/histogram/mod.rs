// SPDX-License-Identifier: GPL-3.0-only

//! Coarse RGB histogram of the preview
//!
//! Full-resolution per-frame histogramming is unaffordable, so at a bounded
//! interval a logical view is resampled into a small offscreen surface, read
//! back synchronously, and binned on the CPU.

use crate::config::HistogramConfig;
use crate::errors::EngineResult;
use crate::params::HistogramMode;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-channel bins plus normalization and change tracking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramData {
    pub red: Vec<u32>,
    pub green: Vec<u32>,
    pub blue: Vec<u32>,
    /// Largest bin across all three channels
    pub max_bin: u32,
    /// Pixels binned in the last recompute
    pub sample_count: u32,
    /// Incremented exactly once per recompute
    pub version: u64,
}

impl HistogramData {
    pub fn new(bins: usize) -> Self {
        Self {
            red: vec![0; bins],
            green: vec![0; bins],
            blue: vec![0; bins],
            max_bin: 0,
            sample_count: 0,
            version: 0,
        }
    }

    /// Bins per channel
    pub fn bins(&self) -> usize {
        self.red.len()
    }

    /// Overwrite the bins in place from RGBA8 pixels
    ///
    /// Each channel value lands in bin `value * bins / 256`. Does not touch
    /// the version counter.
    pub fn rebin(&mut self, rgba: &[u8]) {
        let bins = self.bins();
        self.red.fill(0);
        self.green.fill(0);
        self.blue.fill(0);

        let mut count = 0u32;
        for px in rgba.chunks_exact(4) {
            self.red[px[0] as usize * bins / 256] += 1;
            self.green[px[1] as usize * bins / 256] += 1;
            self.blue[px[2] as usize * bins / 256] += 1;
            count += 1;
        }

        self.sample_count = count;
        self.max_bin = self
            .red
            .iter()
            .chain(&self.green)
            .chain(&self.blue)
            .copied()
            .max()
            .unwrap_or(0);
    }

    /// Bin heights normalized by `max_bin` for display
    pub fn normalized(&self) -> [Vec<f32>; 3] {
        let scale = if self.max_bin > 0 {
            1.0 / self.max_bin as f32
        } else {
            0.0
        };
        let norm = |ch: &[u32]| -> Vec<f32> { ch.iter().map(|&v| v as f32 * scale).collect() };
        [norm(&self.red), norm(&self.green), norm(&self.blue)]
    }
}

/// Bin RGBA8 pixels into a fresh histogram (version 0)
pub fn bin_rgba(rgba: &[u8], bins: usize) -> HistogramData {
    let mut data = HistogramData::new(bins);
    data.rebin(rgba);
    data
}

/// View the histogram samples, resolved from [`HistogramMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramView {
    Original,
    Processed,
    Composite,
}

impl HistogramView {
    pub fn from_mode(mode: HistogramMode) -> Option<Self> {
        match mode {
            HistogramMode::Off => None,
            HistogramMode::Original => Some(HistogramView::Original),
            HistogramMode::Processed => Some(HistogramView::Processed),
            HistogramMode::Composite => Some(HistogramView::Composite),
        }
    }
}

/// Rate-limited histogram recompute
pub struct HistogramExtractor {
    data: HistogramData,
    interval: Duration,
    sample_size: u32,
    last_attempt: Option<Instant>,
}

impl HistogramExtractor {
    pub fn new(config: &HistogramConfig) -> Self {
        Self {
            data: HistogramData::new(config.bins),
            interval: config.interval(),
            sample_size: config.sample_size,
            last_attempt: None,
        }
    }

    /// Latest histogram
    pub fn data(&self) -> &HistogramData {
        &self.data
    }

    /// Side of the square surface the sampler is asked for
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Recompute if the interval elapsed since the last attempt
    ///
    /// `sample` renders the requested view at `sample_size` x `sample_size`
    /// and returns its RGBA8 pixels. A failed sample keeps the previous bins
    /// and version. Returns whether the histogram was updated.
    pub fn maybe_recompute<F>(&mut self, now: Instant, mode: HistogramMode, sample: F) -> bool
    where
        F: FnOnce(HistogramView, u32) -> EngineResult<Vec<u8>>,
    {
        let Some(view) = HistogramView::from_mode(mode) else {
            return false;
        };

        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_attempt = Some(now);

        match sample(view, self.sample_size) {
            Ok(pixels) => {
                self.data.rebin(&pixels);
                self.data.version += 1;
                debug!(
                    ?view,
                    version = self.data.version,
                    max_bin = self.data.max_bin,
                    "Histogram recomputed"
                );
                true
            }
            Err(e) => {
                warn!(?view, "Histogram sample failed, keeping previous bins: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;

    fn gradient_pixels(n: usize) -> Vec<u8> {
        (0..n)
            .flat_map(|i| {
                let v = (i % 256) as u8;
                [v, 255 - v, v / 2, 255]
            })
            .collect()
    }

    #[test]
    fn test_bin_mapping() {
        let mut data = HistogramData::new(64);
        data.rebin(&[0, 3, 4, 255, 255, 128, 252, 255]);
        assert_eq!(data.red[0], 1);
        assert_eq!(data.red[63], 1);
        assert_eq!(data.green[0], 1);
        assert_eq!(data.green[32], 1);
        assert_eq!(data.blue[1], 1);
        assert_eq!(data.blue[63], 1);
        assert_eq!(data.max_bin, 1);
    }

    #[test]
    fn test_bin_rgba_counts_every_pixel() {
        let pixels = gradient_pixels(300);
        let data = bin_rgba(&pixels, 64);
        assert_eq!(data.red.iter().sum::<u32>(), 300);
        assert_eq!(data.green.iter().sum::<u32>(), 300);
        assert_eq!(data.blue.iter().sum::<u32>(), 300);
        assert_eq!(data.sample_count, 300);
        assert_eq!(data.version, 0);
    }

    #[test]
    fn test_failed_sample_keeps_version() {
        let mut extractor = HistogramExtractor::new(&HistogramConfig::default());
        let updated = extractor.maybe_recompute(Instant::now(), HistogramMode::Composite, |_, _| {
            Err(EngineError::Readback("lost device".into()))
        });
        assert!(!updated);
        assert_eq!(extractor.data().version, 0);
    }

    #[test]
    fn test_off_mode_never_samples() {
        let mut extractor = HistogramExtractor::new(&HistogramConfig::default());
        let updated = extractor.maybe_recompute(Instant::now(), HistogramMode::Off, |_, _| {
            panic!("sampler must not run when the histogram is off")
        });
        assert!(!updated);
    }

    #[test]
    fn test_normalized_peaks_at_one() {
        let mut data = HistogramData::new(16);
        data.rebin(&gradient_pixels(1000));
        let [r, g, b] = data.normalized();
        let peak = r.iter().chain(&g).chain(&b).cloned().fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-6);
    }
}
