//! Capture domain: source selection and encoding formats

mod config;
mod format;

pub use config::{CaptureConfig, SourceChange};
pub use format::{probe_format, EncodingFormat, DEFAULT_FORMAT_PREFERENCES};
