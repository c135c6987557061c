//! Scripted in-memory camera.
//!
//! `ScriptedCamera` implements [`CameraDevice`] without hardware: captures
//! produce small synthetic JPEGs (a bright square walking across a dark
//! field, so consecutive shots differ and the motion pipeline has
//! something to find), and a per-trigger outcome script injects busy and
//! error conditions at chosen points.
//!
//! Used by the `stub://` device URL and by the scheduler/bracket tests,
//! which keep a [`StubProbe`] to inspect the device after the session has
//! been released.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{Rgb, RgbImage};

use crate::device::{
    CameraDevice, CameraError, CameraEvent, DevicePath, Result, SettingField, SettingsBlock,
};
use crate::settings::{F_NUMBERS, SETTING_APERTURE, SETTING_SHUTTER, SHUTTER_SPEEDS};

const STORE_FOLDER: &str = "/store_00010001/DCIM/100NCD60";
const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;

/// Outcome of one trigger attempt.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Succeed,
    Busy,
    Fail(String),
}

#[derive(Debug, Default)]
struct StubState {
    open_calls: u32,
    close_calls: u32,
    is_open: bool,
    committed_blocks: u32,
    trigger_attempts: u32,
    shots: u32,
    fetched: Vec<PathBuf>,
    resident: Vec<(DevicePath, Vec<u8>)>,
    deleted: u32,
}

/// Scripted stand-in for the real device binding.
pub struct ScriptedCamera {
    settings: SettingsBlock,
    script: VecDeque<CaptureOutcome>,
    events: VecDeque<CameraEvent>,
    state: Arc<Mutex<StubState>>,
}

impl Default for ScriptedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCamera {
    pub fn new() -> Self {
        let mut settings = SettingsBlock::new();
        settings.insert(
            SETTING_APERTURE,
            SettingField {
                value: "f/8".to_string(),
                choices: F_NUMBERS.iter().map(|v| (*v).to_string()).collect(),
            },
        );
        settings.insert(
            SETTING_SHUTTER,
            SettingField {
                value: "1/125".to_string(),
                choices: SHUTTER_SPEEDS.iter().map(|v| (*v).to_string()).collect(),
            },
        );
        Self {
            settings,
            script: VecDeque::new(),
            events: VecDeque::new(),
            state: Arc::new(Mutex::new(StubState::default())),
        }
    }

    /// Replace the default settings block.
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsBlock) -> Self {
        self.settings = settings;
        self
    }

    /// Queue trigger outcomes, consumed one per capture attempt. An empty
    /// queue means every attempt succeeds.
    #[must_use]
    pub fn with_capture_script(mut self, outcomes: Vec<CaptureOutcome>) -> Self {
        self.script = outcomes.into();
        self
    }

    /// Queue events for `wait_for_event`; an exhausted queue times out.
    #[must_use]
    pub fn with_events(mut self, events: Vec<CameraEvent>) -> Self {
        self.events = events.into();
        self
    }

    /// Handle for inspecting the device after the session consumed it.
    pub fn probe(&self) -> StubProbe {
        StubProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn render_frame(shot: u32) -> Vec<u8> {
        let mut img = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([16, 16, 16]));
        // 8x8 bright square stepping right each shot, wrapping at the edge.
        let x0 = (shot * 8) % (FRAME_WIDTH - 8);
        let y0 = (FRAME_HEIGHT - 8) / 2;
        for y in y0..y0 + 8 {
            for x in x0..x0 + 8 {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        img.write_to(&mut cursor, image::ImageFormat::Jpeg)
            .unwrap_or_default();
        bytes
    }
}

impl CameraDevice for ScriptedCamera {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock().map_err(poisoned)?;
        state.open_calls += 1;
        state.is_open = true;
        Ok(())
    }

    fn summary(&self) -> String {
        "Scripted Camera (stub)".to_string()
    }

    fn read_settings(&mut self) -> Result<SettingsBlock> {
        Ok(self.settings.clone())
    }

    fn write_settings(&mut self, block: &SettingsBlock) -> Result<()> {
        let mut state = self.state.lock().map_err(poisoned)?;
        state.committed_blocks += 1;
        self.settings = block.clone();
        Ok(())
    }

    fn trigger_capture(&mut self) -> Result<DevicePath> {
        let mut state = self.state.lock().map_err(poisoned)?;
        state.trigger_attempts += 1;
        match self.script.pop_front().unwrap_or(CaptureOutcome::Succeed) {
            CaptureOutcome::Succeed => {
                state.shots += 1;
                let path = DevicePath {
                    folder: STORE_FOLDER.to_string(),
                    name: format!("DSC_{:04}.JPG", state.shots),
                };
                let bytes = Self::render_frame(state.shots);
                state.resident.push((path.clone(), bytes));
                Ok(path)
            }
            CaptureOutcome::Busy => Err(CameraError::Busy("PTP device busy".to_string())),
            CaptureOutcome::Fail(detail) => Err(CameraError::Device(detail)),
        }
    }

    fn fetch_file(&mut self, path: &DevicePath, dest: &Path) -> Result<()> {
        let mut state = self.state.lock().map_err(poisoned)?;
        let bytes = state
            .resident
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| CameraError::Device(format!("no such file on camera: {}", path.name)))?;
        std::fs::write(dest, bytes)?;
        state.fetched.push(dest.to_path_buf());
        Ok(())
    }

    fn delete_file(&mut self, path: &DevicePath) -> Result<()> {
        let mut state = self.state.lock().map_err(poisoned)?;
        let before = state.resident.len();
        state.resident.retain(|(p, _)| p != path);
        if state.resident.len() == before {
            return Err(CameraError::Device(format!(
                "no such file on camera: {}",
                path.name
            )));
        }
        state.deleted += 1;
        Ok(())
    }

    fn wait_for_event(&mut self, timeout: Duration) -> Result<CameraEvent> {
        match self.events.pop_front() {
            Some(event) => Ok(event),
            None => {
                // Cap the simulated wait so test runs stay fast.
                std::thread::sleep(timeout.min(Duration::from_millis(1)));
                Ok(CameraEvent::Timeout)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().map_err(poisoned)?;
        state.close_calls += 1;
        state.is_open = false;
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CameraError {
    CameraError::Device("stub state lock poisoned".to_string())
}

/// Post-run view into a [`ScriptedCamera`]'s bookkeeping.
#[derive(Clone)]
pub struct StubProbe {
    state: Arc<Mutex<StubState>>,
}

impl StubProbe {
    pub fn open_calls(&self) -> u32 {
        self.state.lock().map_or(0, |s| s.open_calls)
    }

    pub fn close_calls(&self) -> u32 {
        self.state.lock().map_or(0, |s| s.close_calls)
    }

    pub fn committed_blocks(&self) -> u32 {
        self.state.lock().map_or(0, |s| s.committed_blocks)
    }

    pub fn trigger_attempts(&self) -> u32 {
        self.state.lock().map_or(0, |s| s.trigger_attempts)
    }

    pub fn shots(&self) -> u32 {
        self.state.lock().map_or(0, |s| s.shots)
    }

    /// Files still sitting in camera storage. The session deletes each
    /// capture after transfer, so this should be zero after a clean run.
    pub fn resident_file_count(&self) -> usize {
        self.state.lock().map_or(0, |s| s.resident.len())
    }

    pub fn deleted_files(&self) -> u32 {
        self.state.lock().map_or(0, |s| s.deleted)
    }
}
