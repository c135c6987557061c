use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::trace::{TraceSettings, DEFAULT_SCALE_FACTOR, DEFAULT_THRESHOLD};

const DEFAULT_FRAMES_DIR: &str = "static/frames";
const DEFAULT_DIFFS_DIR: &str = "static/diffs";
const DEFAULT_OVERLAYS_DIR: &str = "static/overlays";
const DEFAULT_LOG_PATH: &str = "logs/timelapse.log";
const DEFAULT_DEVICE: &str = "stub://d60";
const DEFAULT_INTERVAL_SECS: u64 = 120;
const DEFAULT_DURATION_SECS: u64 = 60 * 60 * 24;
const DEFAULT_MARKER: [u8; 3] = [255, 0, 255];

#[derive(Debug, Deserialize, Default)]
struct LapseConfigFile {
    frames_dir: Option<String>,
    diffs_dir: Option<String>,
    overlays_dir: Option<String>,
    log_path: Option<String>,
    device: Option<String>,
    interval_secs: Option<u64>,
    duration_secs: Option<u64>,
    max_consecutive_errors: Option<u32>,
    trace: Option<TraceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TraceConfigFile {
    threshold: Option<u8>,
    scale_factor: Option<u32>,
    marker: Option<[u8; 3]>,
}

#[derive(Debug, Clone)]
pub struct LapseConfig {
    pub frames_dir: PathBuf,
    pub diffs_dir: PathBuf,
    pub overlays_dir: PathBuf,
    pub log_path: PathBuf,
    pub device: String,
    pub interval: Duration,
    pub duration: Option<Duration>,
    pub max_consecutive_errors: Option<u32>,
    pub trace: TraceSettings,
    pub marker: [u8; 3],
}

impl LapseConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LAPSE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LapseConfigFile) -> Self {
        let trace = file.trace.unwrap_or_default();
        Self {
            frames_dir: file
                .frames_dir
                .map_or_else(|| PathBuf::from(DEFAULT_FRAMES_DIR), PathBuf::from),
            diffs_dir: file
                .diffs_dir
                .map_or_else(|| PathBuf::from(DEFAULT_DIFFS_DIR), PathBuf::from),
            overlays_dir: file
                .overlays_dir
                .map_or_else(|| PathBuf::from(DEFAULT_OVERLAYS_DIR), PathBuf::from),
            log_path: file
                .log_path
                .map_or_else(|| PathBuf::from(DEFAULT_LOG_PATH), PathBuf::from),
            device: file.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            interval: Duration::from_secs(file.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)),
            duration: Some(Duration::from_secs(
                file.duration_secs.unwrap_or(DEFAULT_DURATION_SECS),
            )),
            max_consecutive_errors: file.max_consecutive_errors,
            trace: TraceSettings {
                threshold: trace.threshold.unwrap_or(DEFAULT_THRESHOLD),
                scale_factor: trace.scale_factor.unwrap_or(DEFAULT_SCALE_FACTOR),
            },
            marker: trace.marker.unwrap_or(DEFAULT_MARKER),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("LAPSE_FRAMES_DIR") {
            if !dir.trim().is_empty() {
                self.frames_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("LAPSE_DIFFS_DIR") {
            if !dir.trim().is_empty() {
                self.diffs_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("LAPSE_OVERLAYS_DIR") {
            if !dir.trim().is_empty() {
                self.overlays_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("LAPSE_LOG_PATH") {
            if !path.trim().is_empty() {
                self.log_path = PathBuf::from(path);
            }
        }
        if let Ok(device) = std::env::var("LAPSE_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device;
            }
        }
        if let Ok(interval) = std::env::var("LAPSE_INTERVAL_SECS") {
            let secs: u64 = interval
                .parse()
                .map_err(|_| anyhow!("LAPSE_INTERVAL_SECS must be an integer number of seconds"))?;
            self.interval = Duration::from_secs(secs);
        }
        if let Ok(duration) = std::env::var("LAPSE_DURATION_SECS") {
            let secs: u64 = duration
                .parse()
                .map_err(|_| anyhow!("LAPSE_DURATION_SECS must be an integer number of seconds"))?;
            self.duration = Some(Duration::from_secs(secs));
        }
        if let Ok(cap) = std::env::var("LAPSE_MAX_CONSECUTIVE_ERRORS") {
            let cap: u32 = cap
                .parse()
                .map_err(|_| anyhow!("LAPSE_MAX_CONSECUTIVE_ERRORS must be an integer"))?;
            self.max_consecutive_errors = Some(cap);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, dir) in [
            ("frames_dir", &self.frames_dir),
            ("diffs_dir", &self.diffs_dir),
            ("overlays_dir", &self.overlays_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        if self.trace.scale_factor == 0 {
            return Err(anyhow!("trace scale factor must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<LapseConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
