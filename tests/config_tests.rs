// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration loading

use opticlab::{EngineConfig, EngineError};
use std::path::PathBuf;

/// Write `contents` to a per-test file under the system temp directory
fn temp_config(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("opticlab-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_config_default() {
    let config = EngineConfig::default();
    assert_eq!(config.governor.min_ceiling, 2048);
    assert_eq!(config.governor.max_ceiling, 8192);
    assert_eq!(config.governor.pixel_budget, 32_000_000);
    assert_eq!(config.histogram.bins, 64);
    assert_eq!(config.histogram.sample_size, 128);
    assert_eq!(config.histogram.interval_ms, 200);
    assert_eq!(config.saliency.interval_ms, 250);
    assert_eq!(config.saliency.max_dimension, 128);
    assert!(!config.gpu.force_fallback_adapter);
}

#[test]
fn test_partial_file_fills_defaults() {
    let path = temp_config("partial.json", r#"{ "histogram": { "bins": 32 } }"#);
    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.histogram.bins, 32);
    assert_eq!(config.histogram.sample_size, 128);
    assert_eq!(config.governor, EngineConfig::default().governor);
}

#[test]
fn test_invalid_values_are_rejected() {
    let path = temp_config("invalid.json", r#"{ "histogram": { "bins": 0 } }"#);
    assert!(matches!(EngineConfig::load(&path), Err(EngineError::Config(_))));
}

#[test]
fn test_malformed_json_is_a_config_error() {
    let path = temp_config("malformed.json", "{ governor: ");
    assert!(matches!(EngineConfig::load(&path), Err(EngineError::Config(_))));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("opticlab-tests-does-not-exist.json");
    assert!(matches!(EngineConfig::load(&path), Err(EngineError::Io(_))));
}

#[test]
fn test_config_round_trips_through_json() {
    let mut config = EngineConfig::default();
    config.saliency.interval_ms = 500;
    let text = serde_json::to_string(&config).unwrap();
    let parsed: EngineConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
