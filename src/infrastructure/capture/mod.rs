//! Capture adapters

mod cpal_backend;
mod flac_encoder;
mod mixer;
mod scripted;
pub mod wav;

pub use cpal_backend::{CpalBackend, CpalEncoder, CpalStream, PcmTap, FLAC_MIME, WAV_MIME};
pub use flac_encoder::{encode_to_flac, EncodingError};
pub use mixer::{MixBuffer, StreamResampler};
pub use scripted::{ScriptProbe, ScriptedBackend, ScriptedEncoder, ScriptedStream};
