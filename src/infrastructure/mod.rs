//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with cpal capture, HTTP submission and the filesystem.

pub mod capture;
pub mod config;
pub mod download;
pub mod submission;

// Re-export adapters
pub use capture::{CpalBackend, ScriptedBackend};
pub use config::XdgConfigStore;
pub use download::{load_artifact, FileArtifactStore};
pub use submission::HttpSubmissionSink;
