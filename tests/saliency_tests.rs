// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for subject estimation

use opticlab::config::SaliencyConfig;
use opticlab::frame::{StaticFrame, downsample_for_saliency};
use opticlab::saliency::{SaliencyEstimator, SubjectSource, SubjectTracker};
use opticlab::{FrameRegion, LiveFrame, SubjectContext};
use std::time::{Duration, Instant};

/// Gray frame with a square of `inner` on a background of `outer`
fn square_frame(size: u32, start: u32, end: u32, inner: u8, outer: u8) -> StaticFrame {
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let inside = (start..end).contains(&x) && (start..end).contains(&y);
            let v = if inside { inner } else { outer };
            rgba.extend_from_slice(&[v, v, v, 255]);
        }
    }
    StaticFrame::new(size, size, rgba).unwrap()
}

fn estimate(frame: &StaticFrame) -> SubjectContext {
    let small = downsample_for_saliency(frame, 128).unwrap();
    SaliencyEstimator::new().estimate(&small)
}

#[test]
fn test_flat_input_yields_default_subject() {
    let frame = StaticFrame::solid(200, 150, [90, 90, 90, 255]).unwrap();
    assert_eq!(estimate(&frame), SubjectContext::default());
}

#[test]
fn test_bright_square_is_found() {
    let frame = square_frame(128, 44, 84, 230, 20);
    let ctx = estimate(&frame);

    let square = FrameRegion::new(44.0 / 128.0, 44.0 / 128.0, 40.0 / 128.0, 40.0 / 128.0);
    assert_eq!(ctx.source, SubjectSource::Detected);
    assert!(ctx.bbox.overlaps(&square));
    assert!((ctx.center_x - 0.5).abs() < 0.05);
    assert!((ctx.center_y - 0.5).abs() < 0.05);
    assert!(!ctx.backlit);
    assert!(ctx.strength >= 0.2);
}

#[test]
fn test_dark_subject_on_bright_surround_is_backlit() {
    let frame = square_frame(128, 44, 84, 20, 230);
    let ctx = estimate(&frame);
    assert!(ctx.backlit);
    assert!(ctx.brightness < 0.6);
}

#[test]
fn test_bright_ring_around_dark_center_is_backlit() {
    let mut rgba = Vec::with_capacity(128 * 128 * 4);
    for y in 0..128u32 {
        for x in 0..128u32 {
            let inner = (48..80).contains(&x) && (48..80).contains(&y);
            let outer = (34..94).contains(&x) && (34..94).contains(&y);
            let v = if outer && !inner { 230 } else { 20 };
            rgba.extend_from_slice(&[v, v, v, 255]);
        }
    }
    let frame = StaticFrame::new(128, 128, rgba).unwrap();
    let ctx = estimate(&frame);

    let center = FrameRegion::new(48.0 / 128.0, 48.0 / 128.0, 32.0 / 128.0, 32.0 / 128.0);
    assert_eq!(ctx.source, SubjectSource::Detected);
    assert!(ctx.bbox.overlaps(&center));
    assert!(ctx.brightness < 0.6);
    assert!(ctx.backlit);
}

#[test]
fn test_large_source_is_downsampled_first() {
    let frame = square_frame(512, 176, 336, 230, 20);
    let small = downsample_for_saliency(&frame, 128).unwrap();
    assert_eq!((small.width, small.height), (128, 128));

    let ctx = SaliencyEstimator::new().estimate(&small);
    assert!((ctx.center_x - 0.5).abs() < 0.05);
}

#[test]
fn test_tracker_respects_interval_and_force() {
    let config = SaliencyConfig::default();
    let mut tracker = SubjectTracker::new(&config);
    let mut live = LiveFrame::new(64, 64, vec![40; 64 * 64 * 4]).unwrap();
    let t0 = Instant::now();

    assert!(tracker.maybe_update(t0, &live));
    live.update(|px| px[..64 * 4 * 8].fill(220));
    assert!(!tracker.maybe_update(t0 + Duration::from_millis(100), &live));

    tracker.force_next();
    assert!(tracker.maybe_update(t0 + Duration::from_millis(120), &live));
    assert!(tracker.maybe_update(t0 + config.interval() + Duration::from_millis(120), &live));
}

#[test]
fn test_tracker_skips_unchanged_static_source() {
    let config = SaliencyConfig::default();
    let mut tracker = SubjectTracker::new(&config);
    let frame = square_frame(64, 20, 44, 230, 20);
    let t0 = Instant::now();

    assert!(tracker.maybe_update(t0, &frame));
    let first = tracker.latest();
    assert!(!tracker.maybe_update(t0 + config.interval() * 3, &frame));
    assert!(std::sync::Arc::ptr_eq(&first, &tracker.latest()));
}

#[test]
fn test_tracker_reestimates_swapped_still() {
    let config = SaliencyConfig::default();
    let mut tracker = SubjectTracker::new(&config);
    let flat = StaticFrame::solid(128, 128, [20, 20, 20, 255]).unwrap();
    let square = square_frame(128, 44, 84, 230, 20);
    let t0 = Instant::now();

    assert!(tracker.maybe_update(t0, &flat));
    assert_eq!(tracker.latest().source, SubjectSource::Default);

    assert!(tracker.maybe_update(t0 + Duration::from_secs(5), &square));
    assert_eq!(tracker.latest().source, SubjectSource::Detected);
    assert!(!tracker.maybe_update(t0 + Duration::from_secs(10), &square));
}
