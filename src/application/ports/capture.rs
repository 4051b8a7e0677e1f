//! Capture port interfaces
//!
//! A backend opens media streams and binds encoders to them. Streams and
//! encoders are owned values: whoever holds one is responsible for stopping
//! it, and implementations also stop on `Drop`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::domain::capture::EncodingFormat;
use crate::domain::error::CaptureError;

/// Kind of a track inside a media stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// An audio input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub id: String,
    /// Human-readable label. May be empty until permission is granted.
    pub label: String,
}

impl InputDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Constraints for opening a microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneConstraints {
    /// Exact device id. No fallback to another device when set.
    pub device_id: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl MicrophoneConstraints {
    /// Exact device (or the default one) with voice processing hints
    pub fn exact(device_id: Option<String>) -> Self {
        Self {
            device_id,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }

    /// Default device, no processing hints
    pub fn any() -> Self {
        Self {
            device_id: None,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }
}

/// A live capture stream
pub trait MediaStream: Send {
    /// Kinds of the tracks that are still live
    fn tracks(&self) -> Vec<TrackKind>;

    fn audio_track_count(&self) -> usize {
        self.tracks()
            .iter()
            .filter(|kind| **kind == TrackKind::Audio)
            .count()
    }

    /// Stop every video track, returning how many were stopped
    fn stop_video_tracks(&mut self) -> usize;

    /// Stop every track. Calling this twice is a no-op.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Events emitted by a started encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// An encoded chunk. May be empty.
    Data(Vec<u8>),
    /// The encoder finished; no more data follows
    Stopped,
    Error(String),
}

/// An encoder bound to one stream
pub trait Encoder: Send {
    /// Begin encoding.
    ///
    /// With a time slice the encoder emits a chunk every slice; without one
    /// it emits all data at stop. Every `Data` event is delivered before
    /// `Stopped`.
    fn start(
        &mut self,
        timeslice: Option<Duration>,
    ) -> Result<UnboundedReceiver<EncoderEvent>, CaptureError>;

    /// Request a stop. Remaining data and `Stopped` follow on the channel.
    fn stop(&mut self);

    fn is_recording(&self) -> bool;
}

/// Port for the platform's capture capabilities
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    type Stream: MediaStream + 'static;
    type Encoder: Encoder + 'static;

    /// Whether an encoder can produce this MIME type
    fn is_type_supported(&self, mime_type: &str) -> bool;

    async fn enumerate_devices(&self) -> Result<Vec<InputDevice>, CaptureError>;

    async fn open_microphone(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Self::Stream, CaptureError>;

    /// Display capture requesting both video and audio
    async fn open_display(&self) -> Result<Self::Stream, CaptureError>;

    /// Combine streams into one stream with a single mixed audio track.
    /// The mixed stream owns its sources and stops them when stopped.
    fn mix(&self, streams: Vec<Self::Stream>) -> Result<Self::Stream, CaptureError>;

    fn create_encoder(
        &self,
        stream: &Self::Stream,
        format: &EncodingFormat,
    ) -> Result<Self::Encoder, CaptureError>;
}
