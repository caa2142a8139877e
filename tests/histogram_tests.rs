// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for histogram extraction

use opticlab::config::HistogramConfig;
use opticlab::histogram::{HistogramView, bin_rgba};
use opticlab::{EngineError, EngineResult, HistogramExtractor, HistogramMode};
use std::time::{Duration, Instant};

fn noise_pixels(size: u32) -> Vec<u8> {
    let mut state = 0x1234_5678u32;
    (0..size * size)
        .flat_map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            [r, g, b, 255]
        })
        .collect()
}

#[test]
fn test_bins_sum_to_sample_area() {
    let config = HistogramConfig::default();
    let mut extractor = HistogramExtractor::new(&config);
    let size = extractor.sample_size();
    assert_eq!(size, 128);

    let updated = extractor.maybe_recompute(Instant::now(), HistogramMode::Composite, |view, n| {
        assert_eq!(view, HistogramView::Composite);
        Ok(noise_pixels(n))
    });
    assert!(updated);

    let data = extractor.data();
    let area = 128 * 128;
    assert_eq!(data.bins(), 64);
    assert_eq!(data.red.iter().sum::<u32>(), area);
    assert_eq!(data.green.iter().sum::<u32>(), area);
    assert_eq!(data.blue.iter().sum::<u32>(), area);
    assert_eq!(data.sample_count, area);
    assert_eq!(data.version, 1);
}

#[test]
fn test_version_advances_once_per_interval() {
    let config = HistogramConfig::default();
    let mut extractor = HistogramExtractor::new(&config);
    let t0 = Instant::now();
    let sample = |_: HistogramView, n: u32| -> EngineResult<Vec<u8>> { Ok(noise_pixels(n)) };

    assert!(extractor.maybe_recompute(t0, HistogramMode::Processed, sample));
    for ms in [50, 150] {
        let now = t0 + Duration::from_millis(ms);
        assert!(!extractor.maybe_recompute(now, HistogramMode::Processed, sample));
    }
    assert_eq!(extractor.data().version, 1);

    assert!(extractor.maybe_recompute(t0 + config.interval(), HistogramMode::Processed, sample));
    assert_eq!(extractor.data().version, 2);
}

#[test]
fn test_off_mode_never_samples() {
    let mut extractor = HistogramExtractor::new(&HistogramConfig::default());
    let updated = extractor.maybe_recompute(Instant::now(), HistogramMode::Off, |_, _| {
        panic!("sampler must not run when the histogram is off")
    });
    assert!(!updated);
    assert_eq!(extractor.data().version, 0);
}

#[test]
fn test_failed_sample_keeps_previous_bins() {
    let config = HistogramConfig::default();
    let mut extractor = HistogramExtractor::new(&config);
    let t0 = Instant::now();

    assert!(extractor.maybe_recompute(t0, HistogramMode::Original, |_, n| Ok(noise_pixels(n))));
    let before = extractor.data().clone();

    let later = t0 + config.interval() * 2;
    let updated = extractor.maybe_recompute(later, HistogramMode::Original, |_, _| {
        Err(EngineError::Readback("device lost".into()))
    });
    assert!(!updated);
    assert_eq!(extractor.data(), &before);
}

#[test]
fn test_bin_rgba_places_extremes_in_end_bins() {
    let data = bin_rgba(&[0, 0, 0, 255, 255, 255, 255, 255], 64);
    assert_eq!(data.red[0], 1);
    assert_eq!(data.red[63], 1);
    assert_eq!(data.max_bin, 1);
    assert_eq!(data.sample_count, 2);
}
