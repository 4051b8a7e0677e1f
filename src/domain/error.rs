//! Domain error types

use thiserror::Error;

/// Failures while acquiring streams or recording.
///
/// Every variant is recoverable at the user-interaction level: the session
/// moves to its error state and the user may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Access to the microphone was denied. Please grant permission and try again.")]
    PermissionDenied,

    #[error("The selected audio device is not available: {0}")]
    DeviceUnavailable(String),

    #[error("The selected display source does not provide audio.")]
    NoSystemAudioTrack,

    #[error("No audio track is available to record.")]
    NoAudioSource,

    #[error("No supported audio recording format is available.")]
    UnsupportedFormat,

    #[error("Please select at least one audio source.")]
    NoSourceSelected,

    #[error("Audio stream failed: {0}")]
    StreamFailed(String),

    #[error("Audio encoder failed: {0}")]
    EncoderFailed(String),
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

/// Error when a `key=value` form field argument cannot be parsed
#[derive(Debug, Clone, Error)]
#[error("Invalid form field: \"{input}\". Expected format: <name>=<value>")]
pub struct FormFieldParseError {
    pub input: String,
}
