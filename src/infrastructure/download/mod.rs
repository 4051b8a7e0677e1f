mod fs;

pub use fs::{load_artifact, FileArtifactStore};
