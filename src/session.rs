//! Camera session lifecycle and settings transactions.
//!
//! A [`Session`] owns one opened [`CameraDevice`] for the life of the
//! process: opened once, used by exactly one caller at a time, released
//! exactly once on every exit path.
//!
//! Settings reads and writes are scoped transactions against the whole
//! capture-settings block. Even a read commits the (unmodified) block
//! back: the device protocol accepts only whole-block commits, and the
//! commit is what keeps device state and program state in sync. Do not
//! optimize the write away.

use std::path::Path;
use std::time::Duration;

use crate::device::{CameraDevice, CameraError, CameraEvent, Result};
use crate::settings::{SETTING_APERTURE, SETTING_SHUTTER};

/// Default bound for the post-trigger wait on the file-ready event.
const CAPTURE_EVENT_TIMEOUT: Duration = Duration::from_millis(500);

/// Kill any process holding the camera's transport resource before the
/// open; a held PTP claim makes the open fail or hang. Only macOS ships
/// such a daemon.
fn host_transport_fix() {
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("killall")
            .arg("PTPCamera")
            .status();
    }
}

/// An open camera session. Single concurrent user; every device call goes
/// through `&mut self`.
pub struct Session {
    device: Box<dyn CameraDevice>,
    released: bool,
}

impl Session {
    /// Run host pre-init cleanup, open the device, and log its summary.
    pub fn open(mut device: Box<dyn CameraDevice>) -> Result<Self> {
        host_transport_fix();
        device.open()?;
        log::info!("camera session opened: {}", device.summary());
        Ok(Self {
            device,
            released: false,
        })
    }

    /// Read one named setting. Whole-block transaction: fetch the block,
    /// look up the field, commit the unmodified block.
    pub fn get_setting(&mut self, name: &str) -> Result<String> {
        let block = self.device.read_settings()?;
        let value = block
            .get(name)
            .map(|field| field.value.clone())
            .ok_or_else(|| CameraError::SettingNotFound(name.to_string()))?;
        self.device.write_settings(&block)?;
        Ok(value)
    }

    /// Write one named setting. The full block is committed even though a
    /// single field changed.
    pub fn set_setting(&mut self, name: &str, value: &str) -> Result<()> {
        let mut block = self.device.read_settings()?;
        block.set(name, value)?;
        self.device.write_settings(&block)?;
        log::debug!("{name} set to {value}");
        Ok(())
    }

    /// Current aperture value.
    pub fn aperture(&mut self) -> Result<String> {
        self.get_setting(SETTING_APERTURE)
    }

    pub fn set_aperture(&mut self, value: &str) -> Result<()> {
        self.set_setting(SETTING_APERTURE, value)
    }

    /// Current shutter speed value.
    pub fn shutter_speed(&mut self) -> Result<String> {
        self.get_setting(SETTING_SHUTTER)
    }

    pub fn set_shutter_speed(&mut self, value: &str) -> Result<()> {
        self.set_setting(SETTING_SHUTTER, value)
    }

    /// Log every field of the capture-settings block.
    pub fn print_settings(&mut self) -> Result<()> {
        let block = self.device.read_settings()?;
        for (name, field) in block.iter() {
            log::info!("{} : {}", name, field.value);
        }
        self.device.write_settings(&block)?;
        Ok(())
    }

    /// Take one photo: trigger the exposure, wait for the device to report
    /// the file, transfer it to `dest`, and delete the camera-resident
    /// copy so onboard storage stays clear.
    pub fn capture(&mut self, dest: &Path) -> Result<()> {
        let path = self.device.trigger_capture()?;
        // Drain the completion events the trigger queued; a Busy here
        // would already have surfaced from the trigger itself.
        loop {
            match self.device.wait_for_event(CAPTURE_EVENT_TIMEOUT)? {
                CameraEvent::Timeout => break,
                CameraEvent::FileAdded(_) | CameraEvent::CaptureComplete => continue,
                CameraEvent::Unknown => continue,
            }
        }
        self.device.fetch_file(&path, dest)?;
        self.device.delete_file(&path)?;
        Ok(())
    }

    /// Bounded wait for a device event. Used to drain the device's event
    /// queue between shots and as the busy-backoff signal.
    pub fn wait_for_event(&mut self, timeout: Duration) -> Result<CameraEvent> {
        self.device.wait_for_event(timeout)
    }

    /// Release the device handle. Idempotent; only the first call reaches
    /// the device.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.device.close()?;
        log::info!("camera session released");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Last-resort release for panic/early-return paths that skipped
        // the explicit call.
        if !self.released {
            if let Err(err) = self.release() {
                log::warn!("camera release on drop failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::ScriptedCamera;

    #[test]
    fn get_setting_commits_the_unmodified_block() {
        let cam = ScriptedCamera::new();
        let probe = cam.probe();
        let mut session = Session::open(Box::new(cam)).unwrap();
        let value = session.get_setting(SETTING_APERTURE).unwrap();
        assert_eq!(value, "f/8");
        // Read-modify path still writes the whole block back.
        assert_eq!(probe.committed_blocks(), 1);
    }

    #[test]
    fn set_setting_round_trips_through_the_block() {
        let cam = ScriptedCamera::new();
        let probe = cam.probe();
        let mut session = Session::open(Box::new(cam)).unwrap();
        session.set_aperture("f/11").unwrap();
        assert_eq!(session.aperture().unwrap(), "f/11");
        assert_eq!(probe.committed_blocks(), 2);
    }

    #[test]
    fn unknown_setting_propagates_immediately() {
        let cam = ScriptedCamera::new();
        let mut session = Session::open(Box::new(cam)).unwrap();
        let err = session.get_setting("iso").unwrap_err();
        assert!(matches!(err, CameraError::SettingNotFound(_)));
    }

    #[test]
    fn capture_transfers_and_clears_camera_storage() {
        let cam = ScriptedCamera::new();
        let probe = cam.probe();
        let mut session = Session::open(Box::new(cam)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("frame0001.jpg");
        session.capture(&dest).unwrap();
        assert!(dest.exists());
        assert_eq!(probe.resident_file_count(), 0);
        assert_eq!(probe.deleted_files(), 1);
    }

    #[test]
    fn release_reaches_the_device_once() {
        let cam = ScriptedCamera::new();
        let probe = cam.probe();
        let mut session = Session::open(Box::new(cam)).unwrap();
        session.release().unwrap();
        session.release().unwrap();
        drop(session);
        assert_eq!(probe.close_calls(), 1);
    }

    #[test]
    fn drop_releases_when_release_was_skipped() {
        let cam = ScriptedCamera::new();
        let probe = cam.probe();
        let session = Session::open(Box::new(cam)).unwrap();
        drop(session);
        assert_eq!(probe.close_calls(), 1);
    }
}
