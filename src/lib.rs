//! Tethered-camera timelapse kernel.
//!
//! Drives a tethered still camera through an interval photo sequence and
//! derives a motion-highlight sequence from the captured frames.
//!
//! # Architecture
//!
//! Three stages hand off through directory-resident frame sequences; each
//! runs independently once its input sequence exists:
//!
//! 1. `scheduler` paces shots to a fixed interval, absorbing device-busy
//!    conditions and transient faults without losing cadence.
//! 2. `trace` computes a binary changed-region mask for every consecutive
//!    frame pair.
//! 3. `overlay` composites the masks back onto the raw frames as a
//!    marker-color highlight.
//!
//! The camera itself sits behind the `device::CameraDevice` trait; the
//! real transport binding attaches there, and `stub::ScriptedCamera`
//! stands in for it in tests and `stub://` sessions. `bracket` sweeps the
//! (aperture, shutter speed) grid through the same session contract.

pub mod bracket;
pub mod config;
pub mod device;
pub mod frame;
pub mod overlay;
pub mod runlog;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod stub;
pub mod trace;
pub mod ui;

pub use bracket::{BracketShot, BracketSweep};
pub use config::LapseConfig;
pub use device::{CameraDevice, CameraError, CameraEvent, DevicePath, SettingsBlock};
pub use frame::{Frame, FrameSequence};
pub use overlay::{composite, overlay_motion_trace, DEFAULT_MARKER};
pub use runlog::{FileLogSink, LogSink, MemorySink};
pub use scheduler::{CaptureScheduler, RunSummary, SchedulerConfig, SchedulerState};
pub use session::Session;
pub use settings::{ExposureControl, Ladder};
pub use stub::{CaptureOutcome, ScriptedCamera, StubProbe};
pub use trace::{detect_change, trace_motion, BoundingBox, DiffImage, TraceSettings};

use anyhow::{anyhow, Result};

/// Build a device from a device URL. Only `stub://` devices are
/// constructible in this build; real transports attach through the
/// [`CameraDevice`] trait.
pub fn open_device(url: &str) -> Result<Box<dyn CameraDevice>> {
    if url.starts_with("stub://") {
        Ok(Box::new(ScriptedCamera::new()))
    } else {
        Err(anyhow!(
            "unsupported device url {url}: this build only speaks stub://; \
             real transports implement the CameraDevice trait"
        ))
    }
}
