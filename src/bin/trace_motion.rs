//! trace_motion - offline motion-trace pipeline
//!
//! Reads a captured frame directory, writes the diff sequence (binary
//! changed-region masks per consecutive frame pair), then composites the
//! masks back onto the raw frames as marker-color overlays. Each stage is
//! restartable: both outputs are pure functions of the frame directory.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::Rgb;

use tetherlapse::ui::Ui;
use tetherlapse::{overlay_motion_trace, trace_motion, LapseConfig, TraceSettings};

#[derive(Parser, Debug)]
#[command(
    name = "trace_motion",
    about = "Derive motion masks and overlays from a frame sequence"
)]
struct Args {
    /// Frame directory (overrides config)
    #[arg(long, value_name = "DIR")]
    frames_dir: Option<PathBuf>,

    /// Diff output directory (overrides config)
    #[arg(long, value_name = "DIR")]
    diffs_dir: Option<PathBuf>,

    /// Overlay output directory (overrides config)
    #[arg(long, value_name = "DIR")]
    overlays_dir: Option<PathBuf>,

    /// Binarization threshold (overrides config)
    #[arg(long, value_name = "0-255")]
    threshold: Option<u8>,

    /// Integer downscale factor (overrides config)
    #[arg(long, value_name = "N")]
    scale_factor: Option<u32>,

    /// Only write diffs; skip the overlay stage
    #[arg(long)]
    skip_overlay: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let ui = Ui::from_flag(Some(&args.ui), std::io::stderr().is_terminal());

    let mut cfg = LapseConfig::load().context("failed to load configuration")?;
    if let Some(dir) = args.frames_dir {
        cfg.frames_dir = dir;
    }
    if let Some(dir) = args.diffs_dir {
        cfg.diffs_dir = dir;
    }
    if let Some(dir) = args.overlays_dir {
        cfg.overlays_dir = dir;
    }
    let settings = TraceSettings {
        threshold: args.threshold.unwrap_or(cfg.trace.threshold),
        scale_factor: args.scale_factor.unwrap_or(cfg.trace.scale_factor),
    };

    let stage = ui.stage("Trace motion");
    let diffs = trace_motion(&cfg.frames_dir, &cfg.diffs_dir, &settings)?;
    stage.finish_with_count(diffs, "diff");

    if !args.skip_overlay {
        let stage = ui.stage("Overlay motion trace");
        let overlays = overlay_motion_trace(
            &cfg.frames_dir,
            &cfg.diffs_dir,
            &cfg.overlays_dir,
            Rgb(cfg.marker),
        )?;
        stage.finish_with_count(overlays, "overlay");
    }
    Ok(())
}
