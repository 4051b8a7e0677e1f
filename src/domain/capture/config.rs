//! Capture source selection

use serde::{Deserialize, Serialize};

use crate::domain::error::CaptureError;

/// Which sources a recording session captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub include_microphone: bool,
    pub include_system_audio: bool,
    /// Exact microphone device id. `None` selects the default input.
    pub device_id: Option<String>,
}

impl CaptureConfig {
    /// Microphone only, default device
    pub fn microphone() -> Self {
        Self {
            include_microphone: true,
            include_system_audio: false,
            device_id: None,
        }
    }

    /// Microphone plus system audio
    pub fn microphone_and_system() -> Self {
        Self {
            include_system_audio: true,
            ..Self::microphone()
        }
    }

    /// Pin the microphone to an exact device id
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Number of requested sources
    pub fn source_count(&self) -> usize {
        usize::from(self.include_microphone) + usize::from(self.include_system_audio)
    }

    /// At least one source must be selected before a session may start.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.source_count() == 0 {
            return Err(CaptureError::NoSourceSelected);
        }
        Ok(())
    }

    pub fn apply(&mut self, change: SourceChange) {
        match change {
            SourceChange::Microphone(on) => self.include_microphone = on,
            SourceChange::SystemAudio(on) => self.include_system_audio = on,
            SourceChange::Device(device_id) => self.device_id = device_id,
        }
    }
}

/// One change to the source selection.
///
/// Changes are applied by whoever owns the selection, so a refused change
/// leaves nothing behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    Microphone(bool),
    SystemAudio(bool),
    /// `None` goes back to the default input
    Device(Option<String>),
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::microphone()
    }
}
