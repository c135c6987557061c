//! Device-control contract for a tethered still camera.
//!
//! The real transport (PTP over USB) lives outside this crate; everything
//! here talks to the camera through the [`CameraDevice`] trait so the
//! scheduler and bracket enumerator can run against a scripted device in
//! tests and `stub://` sessions.
//!
//! Two protocol quirks the trait deliberately preserves:
//! - Settings are committed as a whole block. The device rejects partial
//!   commits, so a single-field change still writes every field back.
//! - Captured files land in camera-resident storage first and must be
//!   fetched and then deleted; onboard storage is small.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Location of a file in camera-resident storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePath {
    /// Storage folder, e.g. `/store_00010001/DCIM/100NCD60`.
    pub folder: String,
    /// File name within the folder, e.g. `DSC_0042.JPG`.
    pub name: String,
}

/// One named field of the capture-settings block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingField {
    /// Current value as reported by the device.
    pub value: String,
    /// Device-reported choice list; empty when the device does not
    /// constrain the field.
    pub choices: Vec<String>,
}

/// The full capture-settings block of the device.
///
/// Reads and writes go through the whole block. `get`/`set` only touch the
/// in-memory copy; nothing reaches the device until the block is passed
/// back to [`CameraDevice::write_settings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsBlock {
    fields: BTreeMap<String, SettingField>,
}

impl SettingsBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Used by device implementations when
    /// materializing the block.
    pub fn insert(&mut self, name: &str, field: SettingField) {
        self.fields.insert(name.to_string(), field);
    }

    pub fn get(&self, name: &str) -> Option<&SettingField> {
        self.fields.get(name)
    }

    /// Set the value of an existing field.
    ///
    /// Fails with [`CameraError::SettingNotFound`] for unknown names and
    /// [`CameraError::InvalidValue`] when the field carries a choice list
    /// the value is not part of.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let field = self
            .fields
            .get_mut(name)
            .ok_or_else(|| CameraError::SettingNotFound(name.to_string()))?;
        if !field.choices.is_empty() && !field.choices.iter().any(|c| c == value) {
            return Err(CameraError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        field.value = value.to_string();
        Ok(())
    }

    /// Iterate fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingField)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Event emitted by the device, or a timeout of the bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    /// The bounded wait elapsed without a device event.
    Timeout,
    /// A new file appeared in camera storage.
    FileAdded(DevicePath),
    /// An in-flight exposure finished.
    CaptureComplete,
    /// Anything the binding does not classify.
    Unknown,
}

/// Error type for camera operations.
#[derive(Debug)]
pub enum CameraError {
    /// Device could not be opened. Fatal; the process cannot proceed.
    Init(String),
    /// Device cannot currently accept a command. Recoverable; retry after
    /// a backoff signal.
    Busy(String),
    /// Any other capture or settings failure reported by the device.
    Device(String),
    /// No field with the given name exists in the settings block.
    SettingNotFound(String),
    /// The value is not among the field's device-reported choices.
    InvalidValue { name: String, value: String },
    /// Host-side I/O failure while transferring a file.
    Io(std::io::Error),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "device init failed: {msg}"),
            Self::Busy(msg) => write!(f, "device busy: {msg}"),
            Self::Device(msg) => write!(f, "device error: {msg}"),
            Self::SettingNotFound(name) => write!(f, "setting not found: {name}"),
            Self::InvalidValue { name, value } => {
                write!(f, "invalid value for {name}: {value}")
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for CameraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl CameraError {
    /// Busy conditions get event-wait backoff and never count against the
    /// scheduler's consecutive-error cap.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Abstraction over the device-control binding.
///
/// One physical camera, one user: implementations are not required to be
/// thread-safe and all calls are serialized through `&mut self`.
pub trait CameraDevice {
    /// Open the device handle. Called exactly once, before any other call.
    fn open(&mut self) -> Result<()>;

    /// Human-readable device description, logged at session start.
    fn summary(&self) -> String;

    /// Fetch the full capture-settings block from the device.
    fn read_settings(&mut self) -> Result<SettingsBlock>;

    /// Commit a full capture-settings block back to the device.
    fn write_settings(&mut self, block: &SettingsBlock) -> Result<()>;

    /// Trigger one exposure. Returns the camera-resident location of the
    /// resulting file.
    fn trigger_capture(&mut self) -> Result<DevicePath>;

    /// Transfer a camera-resident file to a host path.
    fn fetch_file(&mut self, path: &DevicePath, dest: &Path) -> Result<()>;

    /// Delete a camera-resident file.
    fn delete_file(&mut self, path: &DevicePath) -> Result<()>;

    /// Block until the device emits an event or the timeout elapses.
    fn wait_for_event(&mut self, timeout: Duration) -> Result<CameraEvent>;

    /// Release the device handle. Called exactly once per successful
    /// `open`, on every exit path.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with_choices() -> SettingsBlock {
        let mut block = SettingsBlock::new();
        block.insert(
            "f-number",
            SettingField {
                value: "f/8".to_string(),
                choices: vec!["f/8".to_string(), "f/11".to_string()],
            },
        );
        block.insert(
            "imagequality",
            SettingField {
                value: "JPEG Fine".to_string(),
                choices: vec![],
            },
        );
        block
    }

    #[test]
    fn set_accepts_listed_choice() {
        let mut block = block_with_choices();
        block.set("f-number", "f/11").unwrap();
        assert_eq!(block.get("f-number").unwrap().value, "f/11");
    }

    #[test]
    fn set_rejects_unlisted_choice() {
        let mut block = block_with_choices();
        let err = block.set("f-number", "f/64").unwrap_err();
        assert!(matches!(err, CameraError::InvalidValue { .. }));
    }

    #[test]
    fn set_unconstrained_field_accepts_anything() {
        let mut block = block_with_choices();
        block.set("imagequality", "RAW").unwrap();
        assert_eq!(block.get("imagequality").unwrap().value, "RAW");
    }

    #[test]
    fn set_unknown_field_fails() {
        let mut block = block_with_choices();
        let err = block.set("iso", "400").unwrap_err();
        assert!(matches!(err, CameraError::SettingNotFound(_)));
    }
}
