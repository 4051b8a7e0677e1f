//! Application configuration value object

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::capture::{CaptureConfig, DEFAULT_FORMAT_PREFERENCES};

/// Default encoder time slice (one chunk per second)
pub const DEFAULT_TIMESLICE_MS: u64 = 1000;

/// Default multipart field carrying the recording
pub const DEFAULT_FILE_FIELD: &str = "audio_file";

/// Default multipart field marking that a recording accompanies the form
pub const DEFAULT_MARKER_FIELD: &str = "has_audio";

/// Field names used when an existing file is sent instead of a new recording
pub const DEFAULT_RESEND_FILE_FIELD: &str = "reprocess_audio";
pub const DEFAULT_RESEND_MARKER_FIELD: &str = "has_reprocess_audio";

/// What happens once a recording is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubmitMode {
    /// Download, then submit immediately
    Auto,
    /// Download, then wait for an explicit submit
    #[default]
    Manual,
}

impl SubmitMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SubmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing a submit mode
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid submit mode: \"{input}\". Valid modes are: auto, manual")]
pub struct InvalidSubmitMode {
    pub input: String,
}

impl FromStr for SubmitMode {
    type Err = InvalidSubmitMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(InvalidSubmitMode {
                input: s.to_string(),
            }),
        }
    }
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub endpoint: Option<String>,
    pub context_name: Option<String>,
    pub submit_mode: Option<String>,
    pub formats: Option<Vec<String>>,
    pub timeslice_ms: Option<u64>,
    pub download: Option<bool>,
    pub download_dir: Option<String>,
    pub file_field: Option<String>,
    pub marker_field: Option<String>,
    pub microphone: Option<bool>,
    pub system_audio: Option<bool>,
    pub device_id: Option<String>,
    pub warn_discarded_video: Option<bool>,
    /// Static form fields sent with every submission
    pub form: Option<BTreeMap<String, String>>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            endpoint: None,
            context_name: None,
            submit_mode: Some(SubmitMode::default().to_string()),
            formats: Some(
                DEFAULT_FORMAT_PREFERENCES
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            timeslice_ms: Some(DEFAULT_TIMESLICE_MS),
            download: Some(true),
            download_dir: None,
            file_field: Some(DEFAULT_FILE_FIELD.to_string()),
            marker_field: Some(DEFAULT_MARKER_FIELD.to_string()),
            microphone: Some(true),
            system_audio: Some(false),
            device_id: None,
            warn_discarded_video: Some(true),
            form: None,
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this. Form tables
    /// are merged key by key.
    pub fn merge(self, other: Self) -> Self {
        Self {
            endpoint: other.endpoint.or(self.endpoint),
            context_name: other.context_name.or(self.context_name),
            submit_mode: other.submit_mode.or(self.submit_mode),
            formats: other.formats.or(self.formats),
            timeslice_ms: other.timeslice_ms.or(self.timeslice_ms),
            download: other.download.or(self.download),
            download_dir: other.download_dir.or(self.download_dir),
            file_field: other.file_field.or(self.file_field),
            marker_field: other.marker_field.or(self.marker_field),
            microphone: other.microphone.or(self.microphone),
            system_audio: other.system_audio.or(self.system_audio),
            device_id: other.device_id.or(self.device_id),
            warn_discarded_video: other.warn_discarded_video.or(self.warn_discarded_video),
            form: Self::merge_form(self.form, other.form),
        }
    }

    fn merge_form(
        base: Option<BTreeMap<String, String>>,
        other: Option<BTreeMap<String, String>>,
    ) -> Option<BTreeMap<String, String>> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(mut b), Some(o)) => {
                b.extend(o);
                Some(b)
            }
        }
    }

    /// Get submit mode, or manual if not set/invalid
    pub fn submit_mode_or_default(&self) -> SubmitMode {
        self.submit_mode
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get format preferences, or the built-in list if not set/empty
    pub fn formats_or_default(&self) -> Vec<String> {
        match &self.formats {
            Some(formats) if !formats.is_empty() => formats.clone(),
            _ => DEFAULT_FORMAT_PREFERENCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Encoder time slice. `0` means one continuous chunk.
    pub fn timeslice_or_default(&self) -> Option<Duration> {
        match self.timeslice_ms.unwrap_or(DEFAULT_TIMESLICE_MS) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Get download setting, or true if not set
    pub fn download_or_default(&self) -> bool {
        self.download.unwrap_or(true)
    }

    /// Get download directory, or the user's download dir / cwd
    pub fn download_dir_or_default(&self) -> PathBuf {
        self.download_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn file_field_or_default(&self) -> &str {
        self.file_field.as_deref().unwrap_or(DEFAULT_FILE_FIELD)
    }

    pub fn marker_field_or_default(&self) -> &str {
        self.marker_field.as_deref().unwrap_or(DEFAULT_MARKER_FIELD)
    }

    pub fn warn_discarded_video_or_default(&self) -> bool {
        self.warn_discarded_video.unwrap_or(true)
    }

    /// Capture sources selected by this config
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            include_microphone: self.microphone.unwrap_or(true),
            include_system_audio: self.system_audio.unwrap_or(false),
            device_id: self.device_id.clone().filter(|id| !id.is_empty()),
        }
    }

    /// Static form fields in key order
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.form
            .as_ref()
            .map(|form| form.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}
