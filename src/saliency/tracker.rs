// SPDX-License-Identifier: GPL-3.0-only

//! Rate-limited subject estimation
//!
//! The estimator runs on its own slow clock and publishes each result into a
//! single-slot exchange. The render clock always reads whatever snapshot was
//! published last; nothing is queued.

use super::estimator::SaliencyEstimator;
use super::types::SubjectContext;
use crate::config::SaliencyConfig;
use crate::frame::{FrameSource, downsample_for_saliency};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Single-slot "latest value" exchange; publishing always overwrites
#[derive(Debug)]
pub struct SnapshotSlot<T> {
    latest: Mutex<Arc<T>>,
}

impl<T> SnapshotSlot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            latest: Mutex::new(Arc::new(initial)),
        }
    }

    /// Replace the current snapshot
    pub fn publish(&self, value: T) {
        let value = Arc::new(value);
        match self.latest.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Arc<T> {
        match self.latest.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

/// Runs the estimator at a bounded cadence
pub struct SubjectTracker {
    estimator: SaliencyEstimator,
    slot: Arc<SnapshotSlot<SubjectContext>>,
    interval: Duration,
    max_dimension: u32,
    last_run: Option<Instant>,
    last_key: Option<(u64, usize)>,
    force: bool,
}

impl SubjectTracker {
    pub fn new(config: &SaliencyConfig) -> Self {
        Self {
            estimator: SaliencyEstimator::new(),
            slot: Arc::new(SnapshotSlot::new(SubjectContext::default())),
            interval: config.interval(),
            max_dimension: config.max_dimension,
            last_run: None,
            last_key: None,
            force: false,
        }
    }

    /// Handle for collaborators polling the latest subject
    pub fn slot(&self) -> Arc<SnapshotSlot<SubjectContext>> {
        Arc::clone(&self.slot)
    }

    /// Latest published subject
    pub fn latest(&self) -> Arc<SubjectContext> {
        self.slot.latest()
    }

    /// Make the next `maybe_update` recompute regardless of the interval
    ///
    /// Used for discrete source-change events (new file, new camera).
    pub fn force_next(&mut self) {
        self.force = true;
    }

    /// Recompute if the interval elapsed, a recompute was forced, or this is
    /// the first frame. Static sources whose pixels did not change are not
    /// re-estimated. Returns whether a new snapshot was published.
    pub fn maybe_update(&mut self, now: Instant, source: &dyn FrameSource) -> bool {
        let due = match self.last_run {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        // Static frames all report generation 0, so the pixel address tells stills apart
        let key = (source.generation(), source.pixels().as_ptr() as usize);
        let unchanged = !source.is_live() && self.last_key == Some(key);

        if !self.force && (!due || unchanged) {
            return false;
        }

        self.last_run = Some(now);
        self.force = false;

        let Some(small) = downsample_for_saliency(source, self.max_dimension) else {
            warn!(
                width = source.width(),
                height = source.height(),
                len = source.pixels().len(),
                "Source pixels do not match dimensions, keeping previous subject"
            );
            return false;
        };

        let context = self.estimator.estimate(&small);
        debug!(
            cx = context.center_x,
            cy = context.center_y,
            strength = context.strength,
            backlit = context.backlit,
            "Published subject snapshot"
        );
        self.slot.publish(context);
        self.last_key = Some(key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{LiveFrame, StaticFrame};

    fn config() -> SaliencyConfig {
        SaliencyConfig {
            interval_ms: 250,
            max_dimension: 64,
        }
    }

    #[test]
    fn test_snapshot_slot_overwrites() {
        let slot = SnapshotSlot::new(1u32);
        slot.publish(2);
        slot.publish(3);
        assert_eq!(*slot.latest(), 3);
    }

    #[test]
    fn test_rate_limited_for_live_source() {
        let mut tracker = SubjectTracker::new(&config());
        let frame = LiveFrame::new(8, 8, vec![0; 256]).unwrap();
        let t0 = Instant::now();

        assert!(tracker.maybe_update(t0, &frame));
        assert!(!tracker.maybe_update(t0 + Duration::from_millis(100), &frame));
        assert!(tracker.maybe_update(t0 + Duration::from_millis(260), &frame));
    }

    #[test]
    fn test_forced_update_bypasses_interval() {
        let mut tracker = SubjectTracker::new(&config());
        let frame = StaticFrame::solid(8, 8, [10, 10, 10, 255]).unwrap();
        let t0 = Instant::now();

        assert!(tracker.maybe_update(t0, &frame));
        tracker.force_next();
        assert!(tracker.maybe_update(t0 + Duration::from_millis(1), &frame));
    }

    #[test]
    fn test_static_source_not_reestimated() {
        let mut tracker = SubjectTracker::new(&config());
        let frame = StaticFrame::solid(8, 8, [10, 10, 10, 255]).unwrap();
        let t0 = Instant::now();

        assert!(tracker.maybe_update(t0, &frame));
        assert!(!tracker.maybe_update(t0 + Duration::from_secs(5), &frame));
    }

    #[test]
    fn test_swapped_static_source_is_reestimated() {
        let mut tracker = SubjectTracker::new(&config());
        let flat = StaticFrame::solid(32, 32, [20, 20, 20, 255]).unwrap();
        let mut data = vec![20u8; 32 * 32 * 4];
        for y in 10..22 {
            for x in 10..22 {
                let i = (y * 32 + x) * 4;
                data[i..i + 3].copy_from_slice(&[230, 230, 230]);
            }
        }
        let square = StaticFrame::new(32, 32, data).unwrap();
        let t0 = Instant::now();

        assert!(tracker.maybe_update(t0, &flat));
        assert_eq!(tracker.latest().source, crate::saliency::SubjectSource::Default);

        assert!(tracker.maybe_update(t0 + Duration::from_secs(5), &square));
        assert_eq!(tracker.latest().source, crate::saliency::SubjectSource::Detected);
    }
}
