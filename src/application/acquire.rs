//! Stream acquisition

use tracing::{debug, info, warn};

use crate::domain::capture::CaptureConfig;
use crate::domain::error::CaptureError;

use super::ports::{CaptureBackend, MediaStream, MicrophoneConstraints};

/// A stream ready for encoding
#[derive(Debug)]
pub struct Acquisition<S> {
    /// Stream with at least one audio track
    pub stream: S,
    /// Video tracks that came with a display capture and were stopped
    pub discarded_video_tracks: usize,
}

/// Opens the sources a [`CaptureConfig`] asks for and combines them
pub struct StreamAcquirer<'a, B: CaptureBackend> {
    backend: &'a B,
}

impl<'a, B: CaptureBackend> StreamAcquirer<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Acquire a single audio stream for the selected sources.
    ///
    /// Nothing acquired here outlives a failure: every sub-stream opened
    /// before the failing step is stopped before the error is returned.
    pub async fn acquire(
        &self,
        config: &CaptureConfig,
    ) -> Result<Acquisition<B::Stream>, CaptureError> {
        config.validate()?;

        let mut sources: Vec<B::Stream> = Vec::with_capacity(config.source_count());
        let mut discarded_video_tracks = 0;

        if config.include_microphone {
            let constraints = MicrophoneConstraints::exact(config.device_id.clone());
            let microphone = self.backend.open_microphone(&constraints).await?;
            debug!(device = ?config.device_id, "Microphone acquired");
            sources.push(microphone);
        }

        if config.include_system_audio {
            let mut display = match self.backend.open_display().await {
                Ok(display) => display,
                Err(e) => {
                    release_all(&mut sources);
                    return Err(e);
                }
            };

            discarded_video_tracks = display.stop_video_tracks();
            if discarded_video_tracks > 0 {
                debug!(count = discarded_video_tracks, "Stopped display video tracks");
            }

            if display.audio_track_count() == 0 {
                warn!("Display capture has no audio track");
                display.stop();
                release_all(&mut sources);
                return Err(CaptureError::NoSystemAudioTrack);
            }
            sources.push(display);
        }

        let mut stream = if sources.len() > 1 {
            self.backend.mix(sources)?
        } else {
            sources.pop().ok_or(CaptureError::NoAudioSource)?
        };

        if stream.audio_track_count() == 0 {
            stream.stop();
            return Err(CaptureError::NoAudioSource);
        }

        info!(
            microphone = config.include_microphone,
            system_audio = config.include_system_audio,
            "Capture stream ready"
        );
        Ok(Acquisition {
            stream,
            discarded_video_tracks,
        })
    }
}

fn release_all<S: MediaStream>(streams: &mut Vec<S>) {
    for mut stream in streams.drain(..) {
        stream.stop();
    }
}
