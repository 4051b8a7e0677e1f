//! Deterministic capture backend
//!
//! Streams and encoders follow a script fixed at construction. A shared
//! [`ScriptProbe`] counts what is still open, so callers can check that
//! every device was released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use super::wav;
use crate::application::ports::{
    CaptureBackend, Encoder, EncoderEvent, InputDevice, MediaStream, MicrophoneConstraints,
    TrackKind,
};
use crate::domain::capture::EncodingFormat;
use crate::domain::error::CaptureError;

/// Sample rate of simulated recordings
const SIMULATED_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Default)]
struct ProbeState {
    streams_opened: AtomicUsize,
    live_streams: AtomicUsize,
    live_encoders: AtomicUsize,
    mixes: AtomicUsize,
}

/// Observes streams and encoders created by a [`ScriptedBackend`]
#[derive(Debug, Clone, Default)]
pub struct ScriptProbe {
    state: Arc<ProbeState>,
}

impl ScriptProbe {
    /// Source streams opened so far (mixes not included)
    pub fn streams_opened(&self) -> usize {
        self.state.streams_opened.load(Ordering::SeqCst)
    }

    /// Source streams not yet stopped
    pub fn live_streams(&self) -> usize {
        self.state.live_streams.load(Ordering::SeqCst)
    }

    /// Encoders not yet dropped
    pub fn live_encoders(&self) -> usize {
        self.state.live_encoders.load(Ordering::SeqCst)
    }

    pub fn mixes(&self) -> usize {
        self.state.mixes.load(Ordering::SeqCst)
    }

    /// Nothing is held anymore
    pub fn all_released(&self) -> bool {
        self.live_streams() == 0 && self.live_encoders() == 0
    }
}

/// Stream produced by a [`ScriptedBackend`]
#[derive(Debug)]
pub struct ScriptedStream {
    tracks: Vec<TrackKind>,
    active: bool,
    /// Source streams count toward the probe; mixes only own sources
    counted: bool,
    sources: Vec<ScriptedStream>,
    probe: ScriptProbe,
}

impl ScriptedStream {
    fn source(tracks: Vec<TrackKind>, probe: &ScriptProbe) -> Self {
        probe.state.streams_opened.fetch_add(1, Ordering::SeqCst);
        probe.state.live_streams.fetch_add(1, Ordering::SeqCst);
        Self {
            tracks,
            active: true,
            counted: true,
            sources: Vec::new(),
            probe: probe.clone(),
        }
    }
}

impl MediaStream for ScriptedStream {
    fn tracks(&self) -> Vec<TrackKind> {
        if self.active {
            self.tracks.clone()
        } else {
            Vec::new()
        }
    }

    fn stop_video_tracks(&mut self) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|kind| *kind != TrackKind::Video);
        before - self.tracks.len()
    }

    fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        for source in &mut self.sources {
            source.stop();
        }
        if self.counted {
            self.probe.state.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Encoder produced by a [`ScriptedBackend`].
///
/// Time-sliced encoders emit every scripted chunk as soon as they start;
/// continuous ones emit the chunks joined into one at stop.
pub struct ScriptedEncoder {
    mime_type: EncodingFormat,
    chunks: Vec<Vec<u8>>,
    final_chunk: Option<Vec<u8>>,
    continuous: bool,
    sender: Option<UnboundedSender<EncoderEvent>>,
    probe: ScriptProbe,
}

impl Encoder for ScriptedEncoder {
    fn start(
        &mut self,
        timeslice: Option<Duration>,
    ) -> Result<UnboundedReceiver<EncoderEvent>, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.continuous = timeslice.is_none();
        if !self.continuous {
            for chunk in &self.chunks {
                // A closed receiver only means nobody listens anymore.
                let _ = tx.send(EncoderEvent::Data(chunk.clone()));
            }
        }
        debug!(format = %self.mime_type, continuous = self.continuous, "Scripted encoder started");
        self.sender = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        let Some(tx) = self.sender.take() else {
            return;
        };
        if self.continuous {
            let _ = tx.send(EncoderEvent::Data(self.chunks.concat()));
        }
        if let Some(chunk) = self.final_chunk.take() {
            let _ = tx.send(EncoderEvent::Data(chunk));
        }
        let _ = tx.send(EncoderEvent::Stopped);
    }

    fn is_recording(&self) -> bool {
        self.sender.is_some()
    }
}

impl Drop for ScriptedEncoder {
    fn drop(&mut self) {
        self.probe.state.live_encoders.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Capture backend driven by a fixed script
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    devices: Vec<InputDevice>,
    supported_formats: Vec<String>,
    permission_denied: bool,
    display_denied: bool,
    display_has_audio: bool,
    display_video_tracks: usize,
    pending_permission: bool,
    encoder_start_error: Option<String>,
    chunks: Vec<Vec<u8>>,
    final_chunk: Option<Vec<u8>>,
    probe: ScriptProbe,
}

impl ScriptedBackend {
    /// Two microphones, one of them unlabeled; webm/opus and wav supported;
    /// three chunks
    pub fn new() -> Self {
        Self {
            devices: vec![
                InputDevice::new("default", "Built-in Microphone"),
                InputDevice::new("usb-1", ""),
            ],
            supported_formats: vec![
                "audio/webm;codecs=opus".to_string(),
                "audio/webm".to_string(),
                "audio/wav".to_string(),
            ],
            permission_denied: false,
            display_denied: false,
            display_has_audio: true,
            display_video_tracks: 1,
            pending_permission: false,
            encoder_start_error: None,
            chunks: vec![vec![1, 2, 3], vec![4, 5], vec![6]],
            final_chunk: None,
            probe: ScriptProbe::default(),
        }
    }

    /// One second of silent WAV, for running the CLI without devices
    pub fn simulated() -> Self {
        let pcm = vec![0i16; SIMULATED_SAMPLE_RATE as usize];
        let mut chunk = wav::header(SIMULATED_SAMPLE_RATE, 1, Some(pcm.len() * 2));
        chunk.extend_from_slice(&wav::pcm_bytes(&pcm));

        Self {
            devices: vec![InputDevice::new("simulated", "Simulated Microphone")],
            supported_formats: vec!["audio/wav".to_string()],
            chunks: vec![chunk],
            ..Self::new()
        }
    }

    pub fn with_devices(mut self, devices: Vec<InputDevice>) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_supported_formats<S: Into<String>>(mut self, formats: Vec<S>) -> Self {
        self.supported_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permission_denied(mut self) -> Self {
        self.permission_denied = true;
        self
    }

    pub fn with_display_denied(mut self) -> Self {
        self.display_denied = true;
        self
    }

    /// Display capture yields video only
    pub fn without_display_audio(mut self) -> Self {
        self.display_has_audio = false;
        self
    }

    pub fn with_display_video_tracks(mut self, count: usize) -> Self {
        self.display_video_tracks = count;
        self
    }

    /// Microphone requests never resolve, as if the prompt stayed open
    pub fn with_pending_permission(mut self) -> Self {
        self.pending_permission = true;
        self
    }

    pub fn with_encoder_start_error(mut self, message: impl Into<String>) -> Self {
        self.encoder_start_error = Some(message.into());
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Chunk flushed between the stop request and `Stopped`
    pub fn with_final_chunk(mut self, chunk: Vec<u8>) -> Self {
        self.final_chunk = Some(chunk);
        self
    }

    /// Probe shared with every stream and encoder this backend creates
    pub fn probe(&self) -> ScriptProbe {
        self.probe.clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for ScriptedBackend {
    type Stream = ScriptedStream;
    type Encoder = ScriptedEncoder;

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported_formats.iter().any(|m| m == mime_type)
    }

    async fn enumerate_devices(&self) -> Result<Vec<InputDevice>, CaptureError> {
        Ok(self.devices.clone())
    }

    async fn open_microphone(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<ScriptedStream, CaptureError> {
        if self.pending_permission {
            std::future::pending::<()>().await;
        }
        if self.permission_denied {
            return Err(CaptureError::PermissionDenied);
        }
        if self.devices.is_empty() {
            return Err(CaptureError::DeviceUnavailable("no input device".into()));
        }
        if let Some(id) = &constraints.device_id {
            if !self.devices.iter().any(|d| &d.id == id) {
                return Err(CaptureError::DeviceUnavailable(id.clone()));
            }
        }
        debug!(device = ?constraints.device_id, "Scripted microphone opened");
        Ok(ScriptedStream::source(vec![TrackKind::Audio], &self.probe))
    }

    async fn open_display(&self) -> Result<ScriptedStream, CaptureError> {
        if self.display_denied {
            return Err(CaptureError::PermissionDenied);
        }
        let mut tracks = vec![TrackKind::Video; self.display_video_tracks];
        if self.display_has_audio {
            tracks.push(TrackKind::Audio);
        }
        Ok(ScriptedStream::source(tracks, &self.probe))
    }

    fn mix(&self, streams: Vec<ScriptedStream>) -> Result<ScriptedStream, CaptureError> {
        self.probe.state.mixes.fetch_add(1, Ordering::SeqCst);
        let has_audio = streams.iter().any(|s| s.audio_track_count() > 0);
        Ok(ScriptedStream {
            tracks: if has_audio {
                vec![TrackKind::Audio]
            } else {
                Vec::new()
            },
            active: true,
            counted: false,
            sources: streams,
            probe: self.probe.clone(),
        })
    }

    fn create_encoder(
        &self,
        stream: &ScriptedStream,
        format: &EncodingFormat,
    ) -> Result<ScriptedEncoder, CaptureError> {
        if !self.is_type_supported(format.as_str()) {
            return Err(CaptureError::UnsupportedFormat);
        }
        if !stream.is_active() {
            return Err(CaptureError::StreamFailed("stream is not active".into()));
        }
        if let Some(message) = &self.encoder_start_error {
            return Err(CaptureError::EncoderFailed(message.clone()));
        }
        self.probe.state.live_encoders.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedEncoder {
            mime_type: format.clone(),
            chunks: self.chunks.clone(),
            final_chunk: self.final_chunk.clone(),
            continuous: false,
            sender: None,
            probe: self.probe.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exact_device_without_fallback() {
        let backend = ScriptedBackend::new();
        let err = backend
            .open_microphone(&MicrophoneConstraints::exact(Some("missing".into())))
            .await
            .unwrap_err();
        assert_eq!(err, CaptureError::DeviceUnavailable("missing".into()));
        assert_eq!(backend.probe().streams_opened(), 0);
    }

    #[tokio::test]
    async fn dropping_a_stream_releases_it() {
        let backend = ScriptedBackend::new();
        let stream = backend.open_microphone(&MicrophoneConstraints::any()).await.unwrap();
        assert_eq!(backend.probe().live_streams(), 1);
        drop(stream);
        assert!(backend.probe().all_released());
    }

    #[tokio::test]
    async fn stopping_a_mix_stops_its_sources() {
        let backend = ScriptedBackend::new();
        let mic = backend.open_microphone(&MicrophoneConstraints::any()).await.unwrap();
        let display = backend.open_display().await.unwrap();
        let mut mixed = backend.mix(vec![mic, display]).unwrap();
        assert_eq!(mixed.audio_track_count(), 1);
        assert_eq!(backend.probe().live_streams(), 2);

        mixed.stop();
        mixed.stop();
        assert_eq!(backend.probe().live_streams(), 0);
    }

    #[tokio::test]
    async fn continuous_encoder_emits_once_at_stop() {
        let backend = ScriptedBackend::new();
        let stream = backend.open_microphone(&MicrophoneConstraints::any()).await.unwrap();
        let mut encoder = backend
            .create_encoder(&stream, &EncodingFormat::new("audio/wav"))
            .unwrap();

        let mut events = encoder.start(None).unwrap();
        assert!(events.try_recv().is_err());

        encoder.stop();
        assert_eq!(
            events.recv().await,
            Some(EncoderEvent::Data(vec![1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(events.recv().await, Some(EncoderEvent::Stopped));
    }
}
