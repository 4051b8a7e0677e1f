//! Download port interface

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::artifact::Artifact;

/// Download errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Failed to create download directory: {0}")]
    DirectoryFailed(String),

    #[error("Failed to save recording: {0}")]
    WriteFailed(String),

    #[error("Failed to read recording: {0}")]
    ReadFailed(String),

    #[error("Not a recognized audio file: {0}")]
    UnknownAudioType(String),
}

/// Reference to a materialized download.
/// Held until the session is reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadHandle {
    path: PathBuf,
}

impl DownloadHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Port for letting the user keep a copy of the recording
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Save the artifact under its suggested file name.
    async fn save(&self, artifact: &Artifact) -> Result<DownloadHandle, StoreError>;

    /// Release a handle. The saved copy itself stays with the user.
    fn release(&self, handle: DownloadHandle) {
        tracing::debug!(path = %handle.path().display(), "Released download handle");
    }
}
