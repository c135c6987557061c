//! bracket - exposure bracket sweep
//!
//! Captures one frame per (aperture, shutter speed) combination, from the
//! smallest aperture and shortest exposure down through the ladders, so a
//! bracket is directly comparable across runs. Supplying --aperture pins
//! the aperture and runs only the shutter sweep.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use tetherlapse::{BracketSweep, Session};

#[derive(Parser, Debug)]
#[command(name = "bracket", about = "Sweep the exposure parameter grid")]
struct Args {
    /// Directory receiving bracket captures
    #[arg(long, default_value = "static/bracket", value_name = "DIR")]
    out_dir: PathBuf,

    /// Device url, e.g. stub://d60
    #[arg(long, env = "LAPSE_DEVICE", default_value = "stub://d60", value_name = "URL")]
    device: String,

    /// Fixed aperture value, e.g. f/8; omits the aperture sweep
    #[arg(long, value_name = "F-NUMBER")]
    aperture: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let device = tetherlapse::open_device(&args.device)?;
    let mut session = Session::open(device).context("failed to open camera session")?;

    let mut sweep = BracketSweep::full();
    if let Some(aperture) = &args.aperture {
        sweep = sweep.at_aperture(aperture);
    }
    let result = sweep.run(&mut session, &args.out_dir);
    if let Err(err) = session.release() {
        log::warn!("camera release failed: {err}");
    }
    let captured = result?;

    for path in &captured {
        println!("{}", path.display());
    }
    log::info!("bracket complete: {} captures", captured.len());
    Ok(())
}
