//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod config;
pub mod download;
pub mod submission;
pub mod view;

// Re-export common types
pub use capture::{
    CaptureBackend, Encoder, EncoderEvent, InputDevice, MediaStream, MicrophoneConstraints,
    TrackKind,
};
pub use config::ConfigStore;
pub use download::{ArtifactStore, DownloadHandle, StoreError};
pub use submission::{FormFields, SubmissionSink, SubmitOutcome, GENERIC_FAILURE_MESSAGE};
pub use view::{StatusKind, ViewSink};
