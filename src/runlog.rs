//! Append-only retry log.
//!
//! The scheduler reports every busy/error condition to a [`LogSink`]: one
//! line per event carrying the unix timestamp, the running shot count, and
//! the device error detail. The log exists for post-run diagnosis of
//! multi-hour unattended sessions; nothing ever reads it back at runtime.
//!
//! The sink is passed in explicitly rather than living in process-global
//! state, so tests capture lines in memory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

/// Destination for retry/error diagnostics.
pub trait LogSink {
    /// Append one line for an event at the given running shot count.
    fn append(&mut self, shot_count: u32, detail: &str) -> Result<()>;
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

fn format_line(shot_count: u32, detail: &str) -> String {
    format!("{}, count: {}, error: {}\n", epoch_secs(), shot_count, detail)
}

/// Line-oriented append-only file sink.
pub struct FileLogSink {
    path: PathBuf,
}

impl FileLogSink {
    /// Create a sink writing to `path`, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl LogSink for FileLogSink {
    fn append(&mut self, shot_count: u32, detail: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open log file {}", self.path.display()))?;
        file.write_all(format_line(shot_count, detail).as_bytes())
            .with_context(|| format!("failed to append to log file {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for MemorySink {
    fn append(&mut self, shot_count: u32, detail: &str) -> Result<()> {
        self.lines.push(format_line(shot_count, detail));
        Ok(())
    }
}
