//! lapsed - interval capture daemon
//!
//! Opens a camera session, then paces shots to a fixed interval until the
//! duration expires or Ctrl-C is pressed. Busy and transient device
//! errors are retried without losing cadence; every retry is appended to
//! the run log for post-run diagnosis.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use tetherlapse::{CaptureScheduler, FileLogSink, LapseConfig, SchedulerConfig, Session};

#[derive(Parser, Debug)]
#[command(name = "lapsed", about = "Run an interval capture session")]
struct Args {
    /// Seconds between shots (overrides config)
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Total seconds to run; 0 means unbounded (overrides config)
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Directory receiving frame%04d.jpg files (overrides config)
    #[arg(long, value_name = "DIR")]
    frames_dir: Option<PathBuf>,

    /// Device url, e.g. stub://d60 (overrides config)
    #[arg(long, value_name = "URL")]
    device: Option<String>,

    /// Retry log path (overrides config)
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Abort after this many consecutive non-busy device errors
    #[arg(long, value_name = "N")]
    max_consecutive_errors: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = LapseConfig::load().context("failed to load configuration")?;
    if let Some(secs) = args.interval {
        cfg.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.duration {
        cfg.duration = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(dir) = args.frames_dir {
        cfg.frames_dir = dir;
    }
    if let Some(device) = args.device {
        cfg.device = device;
    }
    if let Some(path) = args.log {
        cfg.log_path = path;
    }
    if let Some(cap) = args.max_consecutive_errors {
        cfg.max_consecutive_errors = Some(cap);
    }

    let device = tetherlapse::open_device(&cfg.device)?;
    let session = Session::open(device).context("failed to open camera session")?;
    let mut sink = FileLogSink::create(&cfg.log_path)?;

    let mut scheduler_cfg =
        SchedulerConfig::new(cfg.interval, cfg.duration, cfg.frames_dir.clone());
    scheduler_cfg.max_consecutive_errors = cfg.max_consecutive_errors;
    let mut scheduler = CaptureScheduler::new(scheduler_cfg);

    let cancel = scheduler.cancel_flag();
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::Relaxed);
    })
    .context("error setting Ctrl-C handler")?;

    log::info!(
        "lapsed running: device {}, frames to {}",
        cfg.device,
        cfg.frames_dir.display()
    );
    let summary = scheduler.run(session, &mut sink)?;

    log::info!(
        "run summary: {} frames, {} busy retries, {} error retries{}",
        summary.frames_captured,
        summary.busy_retries,
        summary.error_retries,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}
