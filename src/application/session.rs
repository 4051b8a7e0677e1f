//! Recording session use case

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::domain::artifact::{package, Artifact, FileNaming};
use crate::domain::capture::{probe_format, CaptureConfig, EncodingFormat};
use crate::domain::error::CaptureError;
use crate::domain::session::{InvalidStateTransition, SessionEvent, SessionState};
use crate::domain::view::SessionSnapshot;

use super::acquire::StreamAcquirer;
use super::ports::{CaptureBackend, Encoder, EncoderEvent, MediaStream};

/// Errors from the recording session
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("{0}")]
    Capture(#[from] CaptureError),

    #[error("{0}")]
    InvalidState(#[from] InvalidStateTransition),
}

/// Options fixed for the lifetime of a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Candidate MIME types in preference order
    pub formats: Vec<String>,
    /// `None` records one continuous chunk
    pub timeslice: Option<Duration>,
    pub naming: FileNaming,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            formats: crate::domain::capture::DEFAULT_FORMAT_PREFERENCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeslice: Some(Duration::from_secs(1)),
            naming: FileNaming::default(),
        }
    }
}

/// One recording lifecycle: acquire, record, finalize.
///
/// The session exclusively owns its stream, encoder, chunk buffer and
/// artifact. The stream and encoder are released on every exit from
/// recording (stop, cancel, failure) and when the session is dropped.
pub struct RecordingSession<B: CaptureBackend> {
    backend: Arc<B>,
    options: SessionOptions,
    state: SessionState,
    format: EncodingFormat,
    stream: Option<B::Stream>,
    encoder: Option<B::Encoder>,
    events: Option<UnboundedReceiver<EncoderEvent>>,
    chunks: Vec<Vec<u8>>,
    elapsed_seconds: u64,
    artifact: Option<Artifact>,
    error_message: Option<String>,
    discarded_video_tracks: usize,
}

impl<B: CaptureBackend> RecordingSession<B> {
    pub fn new(backend: Arc<B>, options: SessionOptions) -> Self {
        Self {
            backend,
            options,
            state: SessionState::Idle,
            format: EncodingFormat::empty(),
            stream: None,
            encoder: None,
            events: None,
            chunks: Vec::new(),
            elapsed_seconds: 0,
            artifact: None,
            error_message: None,
            discarded_video_tracks: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Format resolved by the last start
    pub fn format(&self) -> &EncodingFormat {
        &self.format
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn discarded_video_tracks(&self) -> usize {
        self.discarded_video_tracks
    }

    /// Whether a stream or encoder is still held
    pub fn holds_resources(&self) -> bool {
        self.stream.is_some() || self.encoder.is_some()
    }

    /// Start recording.
    ///
    /// The source and format guards run before anything is opened. Any
    /// failure releases what was acquired and moves the session to
    /// [`SessionState::Error`] with the failure's message.
    pub async fn start(&mut self, config: &CaptureConfig) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(InvalidStateTransition {
                current_state: self.state,
                event: SessionEvent::Start,
            }
            .into());
        }

        if let Err(e) = config.validate() {
            return Err(self.fail(e));
        }

        let backend = Arc::clone(&self.backend);
        let format = probe_format(&self.options.formats, |mime| {
            backend.is_type_supported(mime)
        });
        if format.is_empty() {
            return Err(self.fail(CaptureError::UnsupportedFormat));
        }
        debug!(format = %format, "Resolved recording format");

        self.apply(SessionEvent::Start)?;
        self.format = format;
        self.chunks.clear();
        self.elapsed_seconds = 0;
        self.artifact = None;
        self.error_message = None;
        self.discarded_video_tracks = 0;
        self.cleanup();

        let acquisition = match StreamAcquirer::new(backend.as_ref()).acquire(config).await {
            Ok(acquisition) => acquisition,
            Err(e) => return Err(self.fail(e)),
        };
        self.discarded_video_tracks = acquisition.discarded_video_tracks;

        let encoder = backend.create_encoder(&acquisition.stream, &self.format);
        self.stream = Some(acquisition.stream);
        let mut encoder = match encoder {
            Ok(encoder) => encoder,
            Err(e) => return Err(self.fail(e)),
        };

        let events = match encoder.start(self.options.timeslice) {
            Ok(events) => events,
            Err(e) => {
                drop(encoder);
                return Err(self.fail(e));
            }
        };
        self.encoder = Some(encoder);
        self.events = Some(events);

        self.apply(SessionEvent::Acquired)?;
        info!(format = %self.format, "Recording started");
        Ok(())
    }

    /// Append an encoded chunk. Empty chunks are dropped.
    pub fn accept_chunk(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.chunks.push(chunk);
    }

    /// Wait for the next encoder event.
    ///
    /// Pending forever while no encoder is running, so it can sit in a
    /// `select!` next to other sources.
    pub async fn next_event(&mut self) -> Option<EncoderEvent> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => std::future::pending().await,
        }
    }

    /// React to an event obtained from [`next_event`](Self::next_event)
    pub fn handle_event(&mut self, event: Option<EncoderEvent>) -> Result<(), SessionError> {
        match event {
            Some(EncoderEvent::Data(chunk)) => {
                self.accept_chunk(chunk);
                Ok(())
            }
            Some(EncoderEvent::Error(message)) => Err(self.fail(CaptureError::EncoderFailed(message))),
            Some(EncoderEvent::Stopped) | None => {
                self.events = None;
                if self.state == SessionState::Recording {
                    Err(self.fail(CaptureError::EncoderFailed(
                        "encoder stopped unexpectedly".to_string(),
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// One second of wall-clock recording time has passed
    pub fn tick(&mut self) {
        if self.state == SessionState::Recording {
            self.elapsed_seconds += 1;
        }
    }

    /// Stop recording and package the artifact.
    ///
    /// Waits for the encoder to flush every remaining chunk before
    /// packaging. A recording with no data still finishes, with a
    /// zero-length artifact.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::Stop)?;

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.stop();
        }

        if let Some(mut events) = self.events.take() {
            while let Some(event) = events.recv().await {
                match event {
                    EncoderEvent::Data(chunk) => self.accept_chunk(chunk),
                    EncoderEvent::Stopped => break,
                    EncoderEvent::Error(message) => {
                        return Err(self.fail(CaptureError::EncoderFailed(message)));
                    }
                }
            }
        }

        let name_hint = self.options.naming.name_hint(Utc::now());
        let artifact = package(&self.chunks, &self.format, &name_hint);
        self.chunks.clear();
        self.cleanup();

        self.apply(SessionEvent::Finalized)?;
        info!(
            file = artifact.suggested_file_name(),
            size = %artifact.human_readable_size(),
            "Recording finished"
        );
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Discard the recording in progress.
    ///
    /// Does nothing unless `confirmed`. Returns whether the recording was
    /// discarded.
    pub fn cancel(&mut self, confirmed: bool) -> Result<bool, SessionError> {
        if !confirmed {
            debug!("Cancel not confirmed");
            return Ok(false);
        }
        if self.state == SessionState::AcquiringPermissions {
            self.abort_acquisition()?;
            return Ok(true);
        }

        self.apply(SessionEvent::Cancel)?;
        // Dropping the receiver first discards the stop signal.
        self.events = None;
        self.chunks.clear();
        self.artifact = None;
        self.elapsed_seconds = 0;
        self.cleanup();
        info!("Recording cancelled");
        Ok(true)
    }

    /// Abandon a start whose acquisition was interrupted
    pub fn abort_acquisition(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::Cancel)?;
        self.cleanup();
        info!("Acquisition aborted");
        Ok(())
    }

    /// Finished -> Idle, discarding the artifact
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::Reset)?;
        self.artifact = None;
        self.chunks.clear();
        self.elapsed_seconds = 0;
        Ok(())
    }

    /// Error -> Idle
    pub fn retry(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::Retry)?;
        self.error_message = None;
        self.elapsed_seconds = 0;
        self.cleanup();
        Ok(())
    }

    /// Release stream and encoder. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        self.events = None;
        if let Some(mut encoder) = self.encoder.take() {
            if encoder.is_recording() {
                encoder.stop();
            }
            debug!("Encoder released");
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("Stream released");
        }
    }

    /// Current state for the view
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds,
            format_extension: (!self.format.is_empty())
                .then(|| self.format.extension().to_string()),
            error_message: self.error_message.clone(),
            artifact_name: self
                .artifact
                .as_ref()
                .map(|a| a.suggested_file_name().to_string()),
            artifact_size: self.artifact.as_ref().map(Artifact::human_readable_size),
            source_selected: true,
            submitting: false,
        }
    }

    fn apply(&mut self, event: SessionEvent) -> Result<(), InvalidStateTransition> {
        let next = self.state.transition(event)?;
        debug!(from = %self.state, to = %next, "Session transition");
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, error: CaptureError) -> SessionError {
        warn!(error = %error, state = %self.state, "Recording failed");
        self.cleanup();
        self.chunks.clear();
        self.error_message = Some(error.to_string());
        match self.state.transition(SessionEvent::Fail) {
            Ok(next) => self.state = next,
            Err(e) => debug!(error = %e, "Failure outside an active session"),
        }
        SessionError::Capture(error)
    }
}

impl<B: CaptureBackend> Drop for RecordingSession<B> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
