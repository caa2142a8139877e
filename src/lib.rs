// SPDX-License-Identifier: GPL-3.0-only

//! OpticLab - GPU-resident camera optics and sensor simulator
//!
//! Takes a still image or a live frame and renders how it would look through
//! a configurable camera: exposure, shutter, ISO, aperture, focal length,
//! focus, lens aberrations and a small grading stack. Frames stay on the GPU
//! between stages; only the histogram and saliency paths read pixels back.
//!
//! # Architecture
//!
//! - [`engine`]: frame-driven orchestration ([`Engine::tick`])
//! - [`pipeline`]: ping-pong surfaces, the four compute stages and a CPU reference
//! - [`resolution`]: processing resolution policy under device limits
//! - [`saliency`]: subject estimation on a downsampled copy of the source
//! - [`histogram`]: rate-limited RGB histogram of a chosen view
//! - [`params`]: the per-frame [`ParameterSet`]
//! - [`frame`]: [`FrameSource`] implementations for stills and live input
//! - [`config`]: construction-time [`EngineConfig`]
//! - [`shaders`]: WGSL sources, uniform layouts and GPU readback helpers
//!
//! # Example
//!
//! ```ignore
//! use opticlab::{Engine, EngineConfig, ParameterSet, Resolution, StaticFrame};
//! use std::time::Instant;
//!
//! let source = StaticFrame::open("photo.jpg".as_ref())?;
//! let mut engine = Engine::new(EngineConfig::default())?;
//! let params = ParameterSet { exposure_ev: 1.0, ..Default::default() }.clamped();
//! engine.tick(&source, &params, Resolution::new(1280, 720), Instant::now());
//! let rgba = engine.read_output()?;
//! ```

pub mod color;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod frame;
pub mod gpu;
pub mod histogram;
pub mod params;
pub mod pipeline;
pub mod resolution;
pub mod saliency;
pub mod shaders;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::Engine;
pub use errors::{EngineError, EngineResult, InitError};
pub use frame::{FrameSource, LiveFrame, StaticFrame};
pub use histogram::{HistogramData, HistogramExtractor};
pub use params::{HistogramMode, ParameterSet, PreviewMode, UpscaleStyle};
pub use pipeline::{FrameStats, Pipeline, Snapshot};
pub use resolution::{Resolution, ResolutionGovernor};
pub use saliency::{FrameRegion, SubjectContext};
