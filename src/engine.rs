// SPDX-License-Identifier: GPL-3.0-only

//! Frame-driven orchestration
//!
//! One [`Engine::tick`] is one synchronous pass: poll the subject clock, run
//! the stage pipeline, poll the histogram clock. There are no background
//! threads; the two slow clocks are rate-limited inside the tick and publish
//! snapshots the next frames read.

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::frame::FrameSource;
use crate::gpu::GpuDeviceInfo;
use crate::histogram::{HistogramData, HistogramExtractor};
use crate::params::ParameterSet;
use crate::pipeline::{FrameStats, Pipeline, Snapshot};
use crate::resolution::{Resolution, ResolutionGovernor};
use crate::saliency::{SnapshotSlot, SubjectContext, SubjectTracker};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Pipeline plus the subject and histogram clocks
pub struct Engine {
    pipeline: Pipeline,
    tracker: SubjectTracker,
    histogram: HistogramExtractor,
    frame_index: u32,
    last_stats: Option<FrameStats>,
}

impl Engine {
    /// Validate the configuration and build the GPU pipeline
    ///
    /// Any failure here is fatal; the engine does not retry.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let pipeline = pollster::block_on(Pipeline::new(&config))?;

        let info = pipeline.device_info();
        info!(
            adapter = %info.adapter_name,
            backend = ?info.backend,
            max_dimension = pipeline.governor().max_dimension(),
            pixel_budget = pipeline.governor().pixel_budget(),
            "Engine ready"
        );

        Ok(Self {
            pipeline,
            tracker: SubjectTracker::new(&config.saliency),
            histogram: HistogramExtractor::new(&config.histogram),
            frame_index: 0,
            last_stats: None,
        })
    }

    /// Render one frame
    ///
    /// Per-frame problems are logged and absorbed; `None` means the frame
    /// was skipped and the previous output is still current.
    pub fn tick(
        &mut self,
        source: &dyn FrameSource,
        params: &ParameterSet,
        viewport: Resolution,
        now: Instant,
    ) -> Option<FrameStats> {
        self.tracker.maybe_update(now, source);
        let subject = self.tracker.latest();

        let stats = match self
            .pipeline
            .render(source, params, &subject, viewport, self.frame_index)
        {
            Ok(stats) => stats,
            Err(e) => {
                warn!(frame_index = self.frame_index, "Skipping frame: {}", e);
                return None;
            }
        };

        let pipeline = &mut self.pipeline;
        self.histogram
            .maybe_recompute(now, params.histogram_mode, |view, size| {
                pipeline.sample_view(view, size)
            });

        self.frame_index = self.frame_index.wrapping_add(1);
        self.last_stats = Some(stats);
        Some(stats)
    }

    /// A new file or camera was selected: re-upload and re-estimate next tick
    pub fn notify_source_changed(&mut self) {
        self.pipeline.invalidate_source();
        self.tracker.force_next();
    }

    /// Render the processed image at `target` and read it back
    pub fn export_snapshot(
        &mut self,
        source: &dyn FrameSource,
        params: &ParameterSet,
        target: Resolution,
    ) -> EngineResult<Snapshot> {
        let subject = self.tracker.latest();
        self.pipeline
            .export_snapshot(source, params, &subject, target, self.frame_index)
    }

    /// Composited output of the last frame as RGBA8
    pub fn read_output(&self) -> EngineResult<Vec<u8>> {
        self.pipeline.read_output()
    }

    /// Latest published subject estimate
    pub fn subject(&self) -> Arc<SubjectContext> {
        self.tracker.latest()
    }

    /// Handle collaborators can poll for subject snapshots
    pub fn subject_slot(&self) -> Arc<SnapshotSlot<SubjectContext>> {
        self.tracker.slot()
    }

    pub fn histogram(&self) -> &HistogramData {
        self.histogram.data()
    }

    pub fn last_stats(&self) -> Option<FrameStats> {
        self.last_stats
    }

    /// Seed the next frame will be rendered with
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn device_info(&self) -> &GpuDeviceInfo {
        self.pipeline.device_info()
    }

    pub fn governor(&self) -> &ResolutionGovernor {
        self.pipeline.governor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StaticFrame;
    use std::time::Duration;

    fn gpu_engine() -> Option<Engine> {
        match Engine::new(EngineConfig::default()) {
            Ok(engine) => Some(engine),
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                None
            }
        }
    }

    fn bright_square() -> StaticFrame {
        let mut data = Vec::with_capacity(64 * 64 * 4);
        for y in 0..64u32 {
            for x in 0..64u32 {
                let v = if (20..44).contains(&x) && (20..44).contains(&y) { 230 } else { 20 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        StaticFrame::new(64, 64, data).unwrap()
    }

    #[test]
    fn test_tick_advances_frame_index_and_histogram() {
        let Some(mut engine) = gpu_engine() else {
            return;
        };
        let frame = bright_square();
        let params = ParameterSet::default();
        let viewport = Resolution::new(64, 64);
        let t0 = Instant::now();

        let stats = engine.tick(&frame, &params, viewport, t0).unwrap();
        assert_eq!(stats.frame_index, 0);
        assert_eq!(engine.frame_index(), 1);
        assert_eq!(engine.last_stats(), Some(stats));
        assert_eq!(engine.histogram().version, 1);
        assert_eq!(engine.histogram().sample_count, 128 * 128);
        assert_eq!(engine.read_output().unwrap().len(), 64 * 64 * 4);
    }

    #[test]
    fn test_source_change_forces_subject_refresh() {
        let Some(mut engine) = gpu_engine() else {
            return;
        };
        let frame = bright_square();
        let params = ParameterSet::default();
        let viewport = Resolution::new(64, 64);
        let t0 = Instant::now();

        engine.tick(&frame, &params, viewport, t0);
        let first = engine.subject();
        assert!(engine.subject_slot().latest().strength > 0.0);

        // Unchanged still image: not re-estimated even after the interval
        engine.tick(&frame, &params, viewport, t0 + Duration::from_secs(1));
        assert!(Arc::ptr_eq(&first, &engine.subject()));

        engine.notify_source_changed();
        engine.tick(&frame, &params, viewport, t0 + Duration::from_millis(1010));
        assert!(!Arc::ptr_eq(&first, &engine.subject()));
    }
}
