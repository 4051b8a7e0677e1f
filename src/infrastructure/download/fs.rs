//! Filesystem download adapter

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::application::ports::{ArtifactStore, DownloadHandle, StoreError};
use crate::domain::artifact::{package, Artifact};
use crate::domain::capture::EncodingFormat;

/// Saves recordings into a directory under their suggested names.
/// Existing files with the same name are overwritten.
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save(&self, artifact: &Artifact) -> Result<DownloadHandle, StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::DirectoryFailed(e.to_string()))?;

        let path = self.dir.join(artifact.suggested_file_name());
        fs::write(&path, artifact.bytes())
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        info!(path = %path.display(), size = artifact.size_bytes(), "Recording saved");
        Ok(DownloadHandle::new(path))
    }
}

/// Read an existing audio file as an artifact.
///
/// The format comes from the file extension and the file stem becomes the
/// name hint, so the artifact keeps the file's name.
pub async fn load_artifact(path: impl AsRef<Path>) -> Result<Artifact, StoreError> {
    let path = path.as_ref();
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(EncodingFormat::for_extension)
        .ok_or_else(|| StoreError::UnknownAudioType(path.display().to_string()))?;
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("recording");

    let bytes = fs::read(path)
        .await
        .map_err(|e| StoreError::ReadFailed(format!("{}: {}", path.display(), e)))?;

    info!(path = %path.display(), format = %format, size = bytes.len(), "Recording loaded");
    Ok(package(&[bytes], &format, stem))
}
