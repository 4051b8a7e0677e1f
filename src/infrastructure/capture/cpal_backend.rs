//! Native capture backend using cpal
//!
//! `cpal::Stream` is not `Send`, so every device stream lives on its own
//! capture thread. Threads exchange mono `f32` PCM through [`PcmTap`]s:
//! capture threads fill them, mixer and encoder threads drain them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::flac_encoder::encode_to_flac;
use super::mixer::{MixBuffer, StreamResampler};
use super::wav;
use crate::application::ports::{
    CaptureBackend, Encoder, EncoderEvent, InputDevice, MediaStream, MicrophoneConstraints,
    TrackKind,
};
use crate::domain::capture::EncodingFormat;
use crate::domain::error::CaptureError;

/// How often worker threads poll their taps and stop flags
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lower-case name fragments of inputs that carry system output
const LOOPBACK_MARKERS: &[&str] = &["monitor", "loopback", "stereo mix", "what u hear"];

pub const WAV_MIME: &str = "audio/wav";
pub const FLAC_MIME: &str = "audio/flac";

#[derive(Debug, Default)]
struct TapState {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Shared mono PCM buffer between two threads
#[derive(Debug, Clone, Default)]
pub struct PcmTap {
    state: Arc<Mutex<TapState>>,
}

impl PcmTap {
    fn with_rate(sample_rate: u32) -> Self {
        let tap = Self::default();
        tap.lock().sample_rate = sample_rate;
        tap
    }

    fn lock(&self) -> MutexGuard<'_, TapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, samples: &[f32]) {
        self.lock().samples.extend_from_slice(samples);
    }

    /// Take every buffered sample
    pub fn drain(&self) -> Vec<f32> {
        std::mem::take(&mut self.lock().samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    fn set_sample_rate(&self, sample_rate: u32) {
        self.lock().sample_rate = sample_rate;
    }
}

/// Which input a capture thread opens
#[derive(Debug, Clone)]
enum DeviceSelector {
    Default,
    Named(String),
}

/// A capture stream: one device, a mix of streams, or nothing at all
pub struct CpalStream {
    tracks: Vec<TrackKind>,
    tap: PcmTap,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    sources: Vec<CpalStream>,
}

impl CpalStream {
    /// A stream without tracks (display capture with no audio source)
    fn silent() -> Self {
        Self {
            tracks: Vec::new(),
            tap: PcmTap::default(),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            sources: Vec::new(),
        }
    }
}

impl MediaStream for CpalStream {
    fn tracks(&self) -> Vec<TrackKind> {
        if self.is_active() {
            self.tracks.clone()
        } else {
            Vec::new()
        }
    }

    fn stop_video_tracks(&mut self) -> usize {
        // Native capture never opens video.
        0
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // The worker notices the flag within one poll interval.
        join_worker(self.worker.take(), "capture");
        for source in &mut self.sources {
            source.stop();
        }
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Wav,
    Flac,
}

/// Encoder draining a stream's tap on a worker thread
pub struct CpalEncoder {
    mime_type: EncodingFormat,
    container: Container,
    tap: PcmTap,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Encoder for CpalEncoder {
    fn start(
        &mut self,
        timeslice: Option<Duration>,
    ) -> Result<UnboundedReceiver<EncoderEvent>, CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::EncoderFailed("encoder already started".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // Audio captured before the start belongs to nobody.
        self.tap.drain();

        let container = self.container;
        let tap = self.tap.clone();
        let stop = Arc::clone(&self.stop);
        let worker = thread::Builder::new()
            .name("recform-encoder".into())
            .spawn(move || encoder_thread(container, tap, stop, timeslice, tx))
            .map_err(|e| CaptureError::EncoderFailed(e.to_string()))?;

        debug!(format = %self.mime_type, ?timeslice, "Encoder started");
        self.worker = Some(worker);
        Ok(rx)
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn is_recording(&self) -> bool {
        self.worker.is_some() && !self.stop.load(Ordering::SeqCst)
    }
}

impl Drop for CpalEncoder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        join_worker(self.worker.take(), "encoder");
    }
}

/// Wait for a worker that has been told to stop
fn join_worker(worker: Option<JoinHandle<()>>, name: &str) {
    if let Some(worker) = worker {
        if worker.join().is_err() {
            warn!(worker = name, "Worker thread panicked");
        }
    }
}

fn encoder_thread(
    container: Container,
    tap: PcmTap,
    stop: Arc<AtomicBool>,
    timeslice: Option<Duration>,
    events: UnboundedSender<EncoderEvent>,
) {
    let sample_rate = tap.sample_rate();
    let sliced = match container {
        Container::Wav => timeslice,
        Container::Flac => None,
    };

    let mut pending: Vec<f32> = Vec::new();
    let mut header_sent = false;
    let mut last_flush = Instant::now();

    loop {
        let stopping = stop.load(Ordering::SeqCst);
        pending.extend(tap.drain());

        if let Some(slice) = sliced {
            if stopping || last_flush.elapsed() >= slice {
                let mut chunk = Vec::new();
                if !header_sent {
                    chunk = wav::header(sample_rate, 1, None);
                    header_sent = true;
                }
                chunk.extend(wav::pcm_bytes(&wav::to_i16(&pending)));
                pending.clear();
                last_flush = Instant::now();
                if events.send(EncoderEvent::Data(chunk)).is_err() {
                    debug!("Encoder events dropped, stopping");
                    return;
                }
            }
        }

        if stopping {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    if events.is_closed() {
        debug!("Encoder discarded, skipping final chunk");
        return;
    }

    let last = match (container, sliced) {
        (Container::Wav, None) => {
            let pcm = wav::pcm_bytes(&wav::to_i16(&pending));
            let mut bytes = wav::header(sample_rate, 1, Some(pcm.len()));
            bytes.extend(pcm);
            Some(EncoderEvent::Data(bytes))
        }
        (Container::Flac, _) => match encode_to_flac(&wav::to_i16(&pending), sample_rate) {
            Ok(bytes) => Some(EncoderEvent::Data(bytes)),
            Err(e) => {
                warn!(error = %e, "FLAC encoding failed");
                let _ = events.send(EncoderEvent::Error(e.to_string()));
                return;
            }
        },
        (Container::Wav, Some(_)) => None,
    };

    if let Some(event) = last {
        let _ = events.send(event);
    }
    let _ = events.send(EncoderEvent::Stopped);
    debug!("Encoder thread finished");
}

/// Capture backend on the default cpal host
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    async fn open_input(&self, selector: DeviceSelector) -> Result<CpalStream, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));
        let tap = PcmTap::default();
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker = {
            let running = Arc::clone(&running);
            let tap = tap.clone();
            let selector = selector.clone();
            thread::Builder::new()
                .name("recform-capture".into())
                .spawn(move || capture_thread(selector, tap, running, ready_tx))
                .map_err(|e| CaptureError::StreamFailed(e.to_string()))?
        };

        match ready_rx.await {
            Ok(Ok(sample_rate)) => {
                info!(?selector, sample_rate, "Input stream opened");
                Ok(CpalStream {
                    tracks: vec![TrackKind::Audio],
                    tap,
                    running,
                    worker: Some(worker),
                    sources: Vec::new(),
                })
            }
            Ok(Err(e)) => {
                running.store(false, Ordering::SeqCst);
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                Err(CaptureError::StreamFailed("capture thread exited".into()))
            }
        }
    }
}

fn capture_thread(
    selector: DeviceSelector,
    tap: PcmTap,
    running: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<u32, CaptureError>>,
) {
    let host = cpal::default_host();
    let opened = select_device(&host, &selector).and_then(|device| build_stream(&device, &tap));
    let (stream, sample_rate) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::StreamFailed(e.to_string())));
        return;
    }

    if ready.send(Ok(sample_rate)).is_err() {
        debug!("Capture request abandoned");
        return;
    }

    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }
    drop(stream);
    debug!(?selector, "Capture thread finished");
}

fn select_device(host: &cpal::Host, selector: &DeviceSelector) -> Result<cpal::Device, CaptureError> {
    match selector {
        DeviceSelector::Default => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no input device".into())),
        DeviceSelector::Named(name) => host
            .input_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
            .find(|device| device.name().is_ok_and(|n| n == *name))
            .ok_or_else(|| CaptureError::DeviceUnavailable(name.clone())),
    }
}

fn build_stream(device: &cpal::Device, tap: &PcmTap) -> Result<(cpal::Stream, u32), CaptureError> {
    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = usize::from(config.channels);
    let sample_rate = config.sample_rate.0;
    tap.set_sample_rate(sample_rate);

    let on_error = |err: cpal::StreamError| warn!(error = %err, "Audio stream error");

    let stream = match sample_format {
        SampleFormat::F32 => {
            let tap = tap.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    tap.push(&wav::downmix_to_mono(data, channels));
                },
                on_error,
                None,
            )
        }
        SampleFormat::I16 => {
            let tap = tap.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                    tap.push(&wav::downmix_to_mono(&samples, channels));
                },
                on_error,
                None,
            )
        }
        SampleFormat::U16 => {
            let tap = tap.clone();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<f32> = data
                        .iter()
                        .map(|&s| (f32::from(s) - 32768.0) / 32768.0)
                        .collect();
                    tap.push(&wav::downmix_to_mono(&samples, channels));
                },
                on_error,
                None,
            )
        }
        other => {
            return Err(CaptureError::StreamFailed(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(map_build_error)?;

    Ok((stream, sample_rate))
}

fn map_build_error(error: BuildStreamError) -> CaptureError {
    match error {
        BuildStreamError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable("device is no longer available".into())
        }
        other => CaptureError::StreamFailed(other.to_string()),
    }
}

fn is_loopback_name(name: &str) -> bool {
    let name = name.to_lowercase();
    LOOPBACK_MARKERS.iter().any(|marker| name.contains(marker))
}

fn input_device_names() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

fn mixer_thread(
    sources: Vec<PcmTap>,
    mut resamplers: Vec<Option<StreamResampler>>,
    output: PcmTap,
    running: Arc<AtomicBool>,
) {
    let max_skew = (output.sample_rate() / 2) as usize;
    let mut buffer = MixBuffer::new(sources.len(), max_skew);

    while running.load(Ordering::SeqCst) {
        for (index, (tap, resampler)) in sources.iter().zip(resamplers.iter_mut()).enumerate() {
            let samples = tap.drain();
            let samples = match resampler {
                Some(resampler) => resampler.process(&samples).unwrap_or_else(|e| {
                    warn!(error = %e, source = index, "Dropping unresampled audio");
                    Vec::new()
                }),
                None => samples,
            };
            buffer.push(index, &samples);
        }
        output.push(&buffer.mix_ready());
        thread::sleep(POLL_INTERVAL);
    }
    debug!("Mixer thread finished");
}

#[async_trait]
impl CaptureBackend for CpalBackend {
    type Stream = CpalStream;
    type Encoder = CpalEncoder;

    fn is_type_supported(&self, mime_type: &str) -> bool {
        let format = EncodingFormat::new(mime_type);
        format.codecs().is_none()
            && [WAV_MIME, FLAC_MIME]
                .iter()
                .any(|supported| format.essence().eq_ignore_ascii_case(supported))
    }

    async fn enumerate_devices(&self) -> Result<Vec<InputDevice>, CaptureError> {
        let names = tokio::task::spawn_blocking(input_device_names)
            .await
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))??;

        Ok(names
            .into_iter()
            .filter(|name| !is_loopback_name(name))
            .map(|name| InputDevice::new(name.clone(), name))
            .collect())
    }

    async fn open_microphone(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<CpalStream, CaptureError> {
        if constraints.echo_cancellation
            || constraints.noise_suppression
            || constraints.auto_gain_control
        {
            debug!("Voice processing hints are left to the platform");
        }
        let selector = match &constraints.device_id {
            Some(id) => DeviceSelector::Named(id.clone()),
            None => DeviceSelector::Default,
        };
        self.open_input(selector).await
    }

    async fn open_display(&self) -> Result<CpalStream, CaptureError> {
        let names = tokio::task::spawn_blocking(input_device_names)
            .await
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))??;

        match names.into_iter().find(|name| is_loopback_name(name)) {
            Some(name) => self.open_input(DeviceSelector::Named(name)).await,
            None => {
                warn!("No loopback input found for system audio");
                Ok(CpalStream::silent())
            }
        }
    }

    fn mix(&self, streams: Vec<CpalStream>) -> Result<CpalStream, CaptureError> {
        let target_rate = streams
            .first()
            .map(|stream| stream.tap.sample_rate())
            .filter(|rate| *rate > 0)
            .ok_or(CaptureError::NoAudioSource)?;

        let mut resamplers = Vec::with_capacity(streams.len());
        for stream in &streams {
            let rate = stream.tap.sample_rate();
            resamplers.push(if rate > 0 && rate != target_rate {
                debug!(from = rate, to = target_rate, "Resampling mix source");
                Some(StreamResampler::new(rate, target_rate)?)
            } else {
                None
            });
        }

        let output = PcmTap::with_rate(target_rate);
        let running = Arc::new(AtomicBool::new(true));
        let worker = {
            let taps: Vec<PcmTap> = streams.iter().map(|s| s.tap.clone()).collect();
            let output = output.clone();
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("recform-mixer".into())
                .spawn(move || mixer_thread(taps, resamplers, output, running))
                .map_err(|e| CaptureError::StreamFailed(e.to_string()))?
        };

        info!(sources = streams.len(), sample_rate = target_rate, "Mixing streams");
        Ok(CpalStream {
            tracks: vec![TrackKind::Audio],
            tap: output,
            running,
            worker: Some(worker),
            sources: streams,
        })
    }

    fn create_encoder(
        &self,
        stream: &CpalStream,
        format: &EncodingFormat,
    ) -> Result<CpalEncoder, CaptureError> {
        let container = if format.essence().eq_ignore_ascii_case(WAV_MIME) {
            Container::Wav
        } else if format.essence().eq_ignore_ascii_case(FLAC_MIME) {
            Container::Flac
        } else {
            return Err(CaptureError::UnsupportedFormat);
        };
        if !stream.is_active() {
            return Err(CaptureError::StreamFailed("stream is not active".into()));
        }

        Ok(CpalEncoder {
            mime_type: format.clone(),
            container,
            tap: stream.tap.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
}
