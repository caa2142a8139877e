// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "opticlab")]
#[command(about = "Camera optics and sensor simulator")]
#[command(version = opticlab::constants::app_info::version())]
struct Cli {
    /// Engine configuration file (default: ~/.config/opticlab/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a still image through the simulated camera
    Render {
        /// Input image
        input: PathBuf,

        /// Parameter file (JSON, missing fields use defaults)
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Output file path (default: ~/Pictures/OpticLab/render_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target width (aspect ratio is preserved)
        #[arg(long)]
        width: Option<u32>,

        /// Target height (aspect ratio is preserved)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Print the subject estimate and histogram summary as JSON
    Analyze {
        /// Input image
        input: PathBuf,
    },

    /// Show GPU adapter, resolution limits and parameter ranges
    Info,

    /// Drive the engine with a drifting crop of an image as a live source
    Live {
        /// Input image
        input: PathBuf,

        /// Parameter file (JSON, missing fields use defaults)
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Viewport width
        #[arg(long)]
        width: Option<u32>,

        /// Viewport height
        #[arg(long)]
        height: Option<u32>,

        /// Target frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=opticlab=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            input,
            params,
            output,
            width,
            height,
        } => cli::render_image(config, &input, params.as_deref(), output, width, height),
        Commands::Analyze { input } => cli::analyze_image(config, &input),
        Commands::Info => cli::show_info(config),
        Commands::Live {
            input,
            params,
            width,
            height,
            fps,
            duration,
        } => cli::run_live(
            config,
            &input,
            cli::LiveOptions {
                params_path: params,
                width,
                height,
                fps,
                duration,
            },
        ),
    }
}
