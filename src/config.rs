// SPDX-License-Identifier: GPL-3.0-only

//! Engine configuration
//!
//! Bound once when the engine is constructed and validated up front, so no
//! stage ever looks configuration up per frame.

use crate::constants;
use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Adapter power preference
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PowerPreference {
    /// Prefer a discrete GPU
    #[default]
    HighPerformance,
    /// Prefer an integrated GPU
    LowPower,
}

/// GPU device selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Adapter power preference
    pub power_preference: PowerPreference,
    /// Use the software adapter even when hardware is present
    pub force_fallback_adapter: bool,
}

/// Resolution ceilings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Lower bound of the device-bound dimension ceiling
    pub min_ceiling: u32,
    /// Upper bound of the device-bound dimension ceiling
    pub max_ceiling: u32,
    /// Maximum processing pixel count
    pub pixel_budget: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_ceiling: constants::governor::MIN_CEILING,
            max_ceiling: constants::governor::MAX_CEILING,
            pixel_budget: constants::governor::PIXEL_BUDGET,
        }
    }
}

/// Histogram cadence and size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    /// Minimum time between recomputes in milliseconds
    pub interval_ms: u64,
    /// Bins per channel
    pub bins: usize,
    /// Side of the square surface that is sampled
    pub sample_size: u32,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            interval_ms: constants::histogram::RECOMPUTE_INTERVAL.as_millis() as u64,
            bins: constants::histogram::BINS,
            sample_size: constants::histogram::SAMPLE_SIZE,
        }
    }
}

impl HistogramConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Subject estimator cadence and input size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    /// Minimum time between estimates in milliseconds
    pub interval_ms: u64,
    /// Longest side of the downsampled estimator input
    pub max_dimension: u32,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            interval_ms: constants::saliency::RECOMPUTE_INTERVAL.as_millis() as u64,
            max_dimension: constants::saliency::MAX_DIMENSION,
        }
    }
}

impl SaliencyConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub gpu: GpuConfig,
    pub governor: GovernorConfig,
    pub histogram: HistogramConfig,
    pub saliency: SaliencyConfig,
}

impl EngineConfig {
    /// Default configuration file location (`~/.config/opticlab/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("opticlab").join("config.json"))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_or_default() -> EngineResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject configurations the engine cannot honor
    pub fn validate(&self) -> EngineResult<()> {
        let g = &self.governor;
        if g.min_ceiling == 0 || g.min_ceiling > g.max_ceiling {
            return Err(EngineError::Config(format!(
                "invalid dimension ceiling range {}..={}",
                g.min_ceiling, g.max_ceiling
            )));
        }
        if g.pixel_budget == 0 {
            return Err(EngineError::Config("pixel budget must be positive".into()));
        }

        let h = &self.histogram;
        if h.bins == 0 || h.bins > 256 {
            return Err(EngineError::Config(format!(
                "histogram bins must be in 1..=256, got {}",
                h.bins
            )));
        }
        if h.sample_size == 0 || h.sample_size > 1024 {
            return Err(EngineError::Config(format!(
                "histogram sample size must be in 1..=1024, got {}",
                h.sample_size
            )));
        }

        if self.saliency.max_dimension < 8 {
            return Err(EngineError::Config(format!(
                "saliency max dimension must be at least 8, got {}",
                self.saliency.max_dimension
            )));
        }

        Ok(())
    }
}
