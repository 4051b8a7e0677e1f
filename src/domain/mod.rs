//! Domain layer - Core business logic
//!
//! Contains value objects, the session state machine, the view projection
//! and domain errors. This layer has no dependencies on external systems.

pub mod artifact;
pub mod capture;
pub mod config;
pub mod error;
pub mod session;
pub mod view;

// Re-export common types
pub use artifact::{package, sanitize_file_name, Artifact, FileNaming};
pub use capture::{probe_format, CaptureConfig, EncodingFormat};
pub use config::{AppConfig, SubmitMode};
pub use error::*;
pub use session::{InvalidStateTransition, SessionEvent, SessionState};
pub use view::{render, SessionSnapshot, ViewModel, ViewRegion};
