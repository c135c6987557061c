//! Interval capture scheduler.
//!
//! Drives a [`Session`] through evenly spaced shots for hours at a time,
//! unattended. Two rules shape everything here:
//!
//! - Cadence is anchored to *scheduled* time, not actual time. The next
//!   shot is scheduled at `previous scheduled time + interval`, so one
//!   slow capture does not shift every later shot (drift-free).
//! - Device faults do not end the run. A busy camera gets an event-wait
//!   backoff and the same frame index is retried; other device errors are
//!   logged to the retry sink and retried the same way, optionally capped
//!   by `max_consecutive_errors`.
//!
//! The one unconditional side effect: every exit path (normal, cancelled,
//! or escalated) drains pending events and releases the session exactly
//! once.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::frame::{frame_path, FrameSequence};
use crate::runlog::LogSink;
use crate::session::Session;

/// Stand-in bound for "run forever": a year, same as the original tool.
const UNBOUNDED_DURATION: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Granularity of the cadence sleep; the cancel flag is checked at least
/// this often.
const SLEEP_CHUNK: Duration = Duration::from_millis(50);

/// Offset of the first shot from scheduler start.
const FIRST_SHOT_OFFSET: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Seconds between scheduled shots.
    pub interval: Duration,
    /// Total run time; `None` runs effectively unbounded.
    pub duration: Option<Duration>,
    /// Directory receiving `frame%04d.jpg` files.
    pub frames_dir: PathBuf,
    /// Bound for event-drain and busy-backoff waits.
    pub event_timeout: Duration,
    /// Escalate to a fatal error after this many consecutive non-busy
    /// device errors. `None` retries forever (the original's behavior).
    pub max_consecutive_errors: Option<u32>,
}

impl SchedulerConfig {
    pub fn new(interval: Duration, duration: Option<Duration>, frames_dir: PathBuf) -> Self {
        Self {
            interval,
            duration,
            frames_dir,
            event_timeout: Duration::from_millis(10),
            max_consecutive_errors: None,
        }
    }
}

/// Scheduler lifecycle. `Running` holds the cadence loop; `Draining`
/// performs the final event drain before the session release in
/// `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Draining,
    Terminated,
}

/// What a finished run did.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub frames_captured: u32,
    pub busy_retries: u32,
    pub error_retries: u32,
    pub cancelled: bool,
    /// Scheduled offset from the run anchor of each captured frame, in
    /// capture order. By construction an arithmetic sequence with common
    /// difference `interval`.
    pub scheduled_offsets: Vec<Duration>,
}

pub struct CaptureScheduler {
    config: SchedulerConfig,
    state: SchedulerState,
    cancel: Arc<AtomicBool>,
}

impl CaptureScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancel flag (the ctrlc handler sets it).
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn transition(&mut self, next: SchedulerState) {
        log::debug!("scheduler: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the timelapse to completion, consuming the session.
    ///
    /// Cancellation, duration expiry, and error-cap escalation all pass
    /// through `Draining` and `Terminated`; the session is released on
    /// every one of those paths.
    pub fn run(&mut self, mut session: Session, sink: &mut dyn LogSink) -> Result<RunSummary> {
        self.transition(SchedulerState::Running);
        let outcome = self.cadence_loop(&mut session, sink);

        self.transition(SchedulerState::Draining);
        if let Err(err) = session.wait_for_event(self.config.event_timeout) {
            log::warn!("final event drain failed: {err}");
        }
        if let Err(err) = session.release() {
            log::warn!("camera release failed: {err}");
        }
        self.transition(SchedulerState::Terminated);

        match &outcome {
            Ok(summary) if summary.cancelled => log::info!("timelapse ended."),
            Ok(_) => log::info!("timelapse finished."),
            Err(err) => log::error!("timelapse aborted: {err}"),
        }
        outcome
    }

    fn cadence_loop(&mut self, session: &mut Session, sink: &mut dyn LogSink) -> Result<RunSummary> {
        let interval = self.config.interval;
        let duration = self.config.duration.unwrap_or(UNBOUNDED_DURATION);

        std::fs::create_dir_all(&self.config.frames_dir).with_context(|| {
            format!(
                "failed to create frames directory {}",
                self.config.frames_dir.display()
            )
        })?;
        // Append after any frames already on disk; never renumber.
        let mut count = FrameSequence::scan_frames(&self.config.frames_dir)?.next_free_index();

        let started = Instant::now();
        let mut next_shot = started + FIRST_SHOT_OFFSET;
        let mut summary = RunSummary::default();

        log::info!(
            "timelapse starting: interval {}, duration {}",
            display_duration(interval),
            display_duration(duration)
        );

        'run: loop {
            if self.cancelled() {
                summary.cancelled = true;
                break;
            }

            // Keep the device's internal event queue from overflowing
            // between shots.
            if let Err(err) = session.wait_for_event(self.config.event_timeout) {
                log::warn!("event drain failed: {err}");
            }

            if !self.sleep_until(next_shot) {
                summary.cancelled = true;
                break;
            }

            let dest = frame_path(&self.config.frames_dir, count);
            let mut consecutive_errors = 0u32;
            loop {
                if self.cancelled() {
                    summary.cancelled = true;
                    break 'run;
                }
                match session.capture(&dest) {
                    Ok(()) => break,
                    Err(err) if err.is_busy() => {
                        log::warn!("camera busy on frame {count}, waiting for event");
                        sink.append(count, &err.to_string())?;
                        summary.busy_retries += 1;
                        let _ = session.wait_for_event(self.config.event_timeout);
                        // Same frame index, same scheduled slot.
                    }
                    Err(err) => {
                        log::warn!("device error on frame {count}: {err}");
                        sink.append(count, &err.to_string())?;
                        summary.error_retries += 1;
                        consecutive_errors += 1;
                        if let Some(cap) = self.config.max_consecutive_errors {
                            if consecutive_errors >= cap {
                                return Err(anyhow!(
                                    "giving up on frame {count} after {consecutive_errors} \
                                     consecutive device errors: {err}"
                                ));
                            }
                        }
                        let _ = session.wait_for_event(self.config.event_timeout);
                    }
                }
            }

            log::info!("captured frame #{count}");
            summary.frames_captured += 1;
            summary
                .scheduled_offsets
                .push(next_shot.duration_since(started));
            // Advance the cadence anchor by scheduled, not actual, time.
            next_shot += interval;
            count += 1;

            if started.elapsed() > duration {
                break;
            }
        }

        Ok(summary)
    }

    /// Chunked sleep until `deadline`, polling the cancel flag. Returns
    /// false when cancelled.
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_CHUNK));
        }
    }
}

/// Human-readable duration for the start banner, e.g. "2 minutes, 30
/// seconds".
pub fn display_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    let mut parts = Vec::new();
    for (n, unit) in [(hours, "hour"), (minutes, "minute"), (seconds, "second")] {
        if n > 0 {
            let plural = if n > 1 { "s" } else { "" };
            parts.push(format!("{n} {unit}{plural}"));
        }
    }
    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}
