// SPDX-License-Identifier: GPL-3.0-only

//! Subject estimation without a depth sensor
//!
//! A CPU heuristic finds the most "interesting" region of a small copy of the
//! frame. The result biases the vignette and defocus centers and protects the
//! subject from synthetic blur. It is advisory: consumers blend toward it by
//! its strength, so weak estimates degrade to plain geometric-center behavior.

mod estimator;
mod tracker;
mod types;

pub use estimator::{SaliencyEstimator, subject_confidence};
pub use tracker::{SnapshotSlot, SubjectTracker};
pub use types::{FrameRegion, SubjectContext, SubjectSource};
