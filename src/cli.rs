// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Rendering a still image through the simulated camera
//! - Analyzing subject placement and tonal distribution
//! - Reporting GPU and resolution limits
//! - Driving the engine with a simulated live source

use chrono::Local;
use opticlab::frame::{FrameSource, LiveFrame, StaticFrame, downsample_for_saliency};
use opticlab::histogram::bin_rgba;
use opticlab::params::PARAMETER_RANGES;
use opticlab::saliency::SaliencyEstimator;
use opticlab::{Engine, EngineConfig, HistogramData, ParameterSet, Resolution};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Default folder name for rendered snapshots
const DEFAULT_SAVE_FOLDER: &str = "OpticLab";

/// Viewport used by `live` when none is given
const DEFAULT_LIVE_VIEWPORT: Resolution = Resolution {
    width: 1280,
    height: 720,
};

/// Fraction of the source each live crop covers along both axes
const LIVE_CROP_FRACTION: f32 = 0.75;

/// Load the engine configuration from `path`, or the default location
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default()?,
    };
    Ok(config)
}

/// Read a parameter file and clamp it, or fall back to defaults
fn load_params(path: Option<&Path>) -> Result<ParameterSet, Box<dyn std::error::Error>> {
    let params = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<ParameterSet>(&text)?
        }
        None => ParameterSet::default(),
    };
    Ok(params.clamped())
}

/// Render a still image through the simulated camera and save the result
pub fn render_image(
    config: EngineConfig,
    input: &Path,
    params_path: Option<&Path>,
    output: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = StaticFrame::open(input)?;
    let params = load_params(params_path)?;
    println!(
        "Input: {} ({}x{})",
        input.display(),
        source.width(),
        source.height()
    );

    let target = Resolution::new(
        width.unwrap_or(source.width()),
        height.unwrap_or(source.height()),
    );

    let mut engine = Engine::new(config)?;
    println!("Using adapter: {}", engine.device_info().adapter_name);

    // Let the subject estimator see the image before exporting
    engine.tick(&source, &params, target, Instant::now());
    let snapshot = engine.export_snapshot(&source, &params, target)?;

    let output_path = match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            path
        }
        None => {
            let dir = get_default_output_dir();
            std::fs::create_dir_all(&dir)?;
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("render_{}.png", timestamp))
        }
    };

    let image = image::RgbaImage::from_raw(snapshot.width, snapshot.height, snapshot.rgba)
        .ok_or("Snapshot buffer does not match its dimensions")?;
    image.save(&output_path)?;

    println!(
        "Rendered {}x{}: {}",
        snapshot.width,
        snapshot.height,
        output_path.display()
    );
    Ok(())
}

/// Print the subject estimate and a histogram summary as JSON
///
/// Runs entirely on the CPU; no GPU is required.
pub fn analyze_image(
    config: EngineConfig,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = StaticFrame::open(input)?;

    let small = downsample_for_saliency(&source, config.saliency.max_dimension)
        .ok_or("Failed to downsample image for analysis")?;
    let subject = SaliencyEstimator::new().estimate(&small);
    let histogram = bin_rgba(source.pixels(), config.histogram.bins);

    let report = serde_json::json!({
        "input": input.display().to_string(),
        "width": source.width(),
        "height": source.height(),
        "subject": subject,
        "histogram": histogram_summary(&histogram),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn histogram_summary(histogram: &HistogramData) -> serde_json::Value {
    let bins = histogram.bins();
    let mean = |channel: &[u32]| -> f32 {
        let total: u64 = channel.iter().map(|&c| c as u64).sum();
        if total == 0 || bins < 2 {
            return 0.0;
        }
        let weighted: f64 = channel
            .iter()
            .enumerate()
            .map(|(i, &c)| i as f64 * c as f64)
            .sum();
        (weighted / total as f64 / (bins - 1) as f64) as f32
    };
    let peak = |channel: &[u32]| -> usize {
        channel
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| **c)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };

    serde_json::json!({
        "bins": bins,
        "sample_count": histogram.sample_count,
        "max_bin": histogram.max_bin,
        "mean": [mean(&histogram.red), mean(&histogram.green), mean(&histogram.blue)],
        "peak_bin": [peak(&histogram.red), peak(&histogram.green), peak(&histogram.blue)],
    })
}

/// Print adapter details, resolution limits and parameter ranges
pub fn show_info(config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new(config)?;
    let info = engine.device_info();
    let governor = engine.governor();

    println!("OpticLab {}", opticlab::constants::app_info::version());
    println!();
    println!("Adapter: {}", info.adapter_name);
    println!("  Backend: {:?}", info.backend);
    println!("  Type: {:?}", info.device_type);
    println!("  Max texture dimension: {}", info.max_texture_dimension);
    println!();
    println!("Resolution limits:");
    println!("  Max processing dimension: {}", governor.max_dimension());
    println!("  Pixel budget: {} px", governor.pixel_budget());
    println!();
    println!("Parameters:");
    for range in PARAMETER_RANGES.iter() {
        println!(
            "  {:<22} [{}, {}] default {}",
            range.name, range.min, range.max, range.default
        );
    }
    Ok(())
}

/// Options for the simulated live run
pub struct LiveOptions {
    pub params_path: Option<PathBuf>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: u32,
    pub duration: Option<u64>,
}

/// Drive the engine with a crop that drifts across the input
///
/// Prints frame rate and the subject/histogram state once per second until
/// Ctrl+C or the optional duration elapses.
pub fn run_live(
    config: EngineConfig,
    input: &Path,
    options: LiveOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let still = StaticFrame::open(input)?;
    let params = load_params(options.params_path.as_deref())?;
    let viewport = Resolution::new(
        options.width.unwrap_or(DEFAULT_LIVE_VIEWPORT.width),
        options.height.unwrap_or(DEFAULT_LIVE_VIEWPORT.height),
    );

    let (src_w, src_h) = (still.width(), still.height());
    let crop_w = ((src_w as f32 * LIVE_CROP_FRACTION) as u32).max(1);
    let crop_h = ((src_h as f32 * LIVE_CROP_FRACTION) as u32).max(1);
    let mut live = LiveFrame::new(crop_w, crop_h, vec![0; (crop_w * crop_h * 4) as usize])?;

    let mut engine = Engine::new(config)?;
    println!("Using adapter: {}", engine.device_info().adapter_name);
    println!(
        "Live source: {}x{} crop of {} ({}x{}), viewport {}",
        crop_w,
        crop_h,
        input.display(),
        src_w,
        src_h,
        viewport
    );
    println!("Running... (press Ctrl+C to stop)");

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let frame_interval = Duration::from_secs_f64(1.0 / options.fps.max(1) as f64);
    let run_for = options.duration.map(Duration::from_secs);
    let start = Instant::now();
    let mut last_report = start;
    let mut frames_since_report = 0u32;
    let mut skipped = 0u32;
    let subject_slot = engine.subject_slot();
    let mut subject = subject_slot.latest();
    let mut subject_updates = 0u32;

    while !stop_flag.load(Ordering::SeqCst) {
        let frame_start = Instant::now();
        if run_for.is_some_and(|d| frame_start.duration_since(start) >= d) {
            break;
        }

        let t = frame_start.duration_since(start).as_secs_f32();
        let (x0, y0) = drift_offset(t, src_w - crop_w, src_h - crop_h);
        live.update(|dst| copy_crop(still.pixels(), src_w, x0, y0, crop_w, crop_h, dst));

        match engine.tick(&live, &params, viewport, frame_start) {
            Some(_) => frames_since_report += 1,
            None => skipped += 1,
        }

        let latest = subject_slot.latest();
        if !Arc::ptr_eq(&latest, &subject) {
            subject_updates += 1;
            subject = latest;
        }

        let since_report = frame_start.duration_since(last_report);
        if since_report >= Duration::from_secs(1) {
            let fps = frames_since_report as f32 / since_report.as_secs_f32();
            let processing = engine
                .last_stats()
                .map(|s| s.processing.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:6.1} fps | processing {} | subject ({:.2}, {:.2}) conf {:.2}{} [{} updates] | histogram {} v{} | skipped {}",
                fps,
                processing,
                subject.center_x,
                subject.center_y,
                subject.confidence,
                if subject.backlit { " backlit" } else { "" },
                subject_updates,
                params.histogram_mode.display_name(),
                engine.histogram().version,
                skipped
            );
            frames_since_report = 0;
            last_report = frame_start;
        }

        if let Some(rest) = frame_interval.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    println!();
    println!("Stopped after {} frames", engine.frame_index());
    Ok(())
}

/// Top-left corner of the crop at time `t`, sweeping slowly in both axes
fn drift_offset(t: f32, max_x: u32, max_y: u32) -> (u32, u32) {
    let fx = 0.5 + 0.5 * (t * 0.4).sin();
    let fy = 0.5 + 0.5 * (t * 0.27).cos();
    (
        ((fx * max_x as f32).round() as u32).min(max_x),
        ((fy * max_y as f32).round() as u32).min(max_y),
    )
}

/// Copy a `w` x `h` window at (`x0`, `y0`) of an RGBA8 image into `dst`
fn copy_crop(src: &[u8], src_width: u32, x0: u32, y0: u32, w: u32, h: u32, dst: &mut [u8]) {
    let row_bytes = w as usize * 4;
    for (y, dst_row) in dst.chunks_exact_mut(row_bytes).take(h as usize).enumerate() {
        let start = ((y0 as usize + y) * src_width as usize + x0 as usize) * 4;
        if let Some(src_row) = src.get(start..start + row_bytes) {
            dst_row.copy_from_slice(src_row);
        }
    }
}

/// Get default output directory
fn get_default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}
