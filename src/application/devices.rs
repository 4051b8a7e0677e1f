//! Input device listing

use tracing::{debug, warn};

use crate::domain::error::CaptureError;

use super::ports::{CaptureBackend, InputDevice, MediaStream, MicrophoneConstraints};

/// List audio input devices with usable labels.
///
/// A throwaway acquisition of the default microphone runs first so that the
/// platform exposes device labels; it is released before enumerating.
/// Permission denial is returned as an error. No device at all yields an
/// empty list, and the caller should disable the microphone option.
pub async fn list_input_devices<B: CaptureBackend>(
    backend: &B,
) -> Result<Vec<InputDevice>, CaptureError> {
    match backend.open_microphone(&MicrophoneConstraints::any()).await {
        Ok(mut probe) => probe.stop(),
        Err(CaptureError::PermissionDenied) => {
            warn!("Microphone permission denied while listing devices");
            return Err(CaptureError::PermissionDenied);
        }
        Err(CaptureError::DeviceUnavailable(reason)) => {
            debug!(%reason, "No microphone available");
            return Ok(Vec::new());
        }
        Err(CaptureError::NoAudioSource) => {
            debug!("No microphone available");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    }

    let devices = backend.enumerate_devices().await?;
    debug!(count = devices.len(), "Enumerated input devices");
    Ok(label_devices(devices))
}

/// Fill empty labels with `Microphone N` (1-based position)
fn label_devices(devices: Vec<InputDevice>) -> Vec<InputDevice> {
    devices
        .into_iter()
        .enumerate()
        .map(|(index, mut device)| {
            if device.label.trim().is_empty() {
                device.label = format!("Microphone {}", index + 1);
            }
            device
        })
        .collect()
}
