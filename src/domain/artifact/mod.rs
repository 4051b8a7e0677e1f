//! Recorded artifact value object and packaging

mod naming;

pub use naming::FileNaming;

use crate::domain::capture::EncodingFormat;

/// Characters replaced when turning a name hint into a file name
const ILLEGAL_FILE_NAME_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Placeholder substituted for every illegal character
const FILE_NAME_PLACEHOLDER: char = '-';

/// Finalized recording, ready for download or upload.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
    mime_type: EncodingFormat,
    suggested_file_name: String,
    extension: String,
}

impl Artifact {
    /// Get the recorded bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &EncodingFormat {
        &self.mime_type
    }

    /// File name including extension
    pub fn suggested_file_name(&self) -> &str {
        &self.suggested_file_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

/// Concatenate chunks in arrival order into an [`Artifact`].
///
/// The extension is taken from the MIME subtype only; `name_hint` is
/// sanitized but otherwise used verbatim. Zero chunks yield a zero-length
/// artifact.
pub fn package<C: AsRef<[u8]>>(chunks: &[C], mime_type: &EncodingFormat, name_hint: &str) -> Artifact {
    let total: usize = chunks.iter().map(|c| c.as_ref().len()).sum();
    let mut bytes = Vec::with_capacity(total);
    for chunk in chunks {
        bytes.extend_from_slice(chunk.as_ref());
    }

    let extension = mime_type.extension().to_string();
    let base = sanitize_file_name(name_hint);
    let suggested_file_name = if extension.is_empty() {
        base
    } else {
        format!("{}.{}", base, extension)
    };

    Artifact {
        bytes,
        mime_type: mime_type.clone(),
        suggested_file_name,
        extension,
    }
}

/// Replace characters that are illegal in file names with a placeholder.
pub fn sanitize_file_name(name_hint: &str) -> String {
    name_hint
        .chars()
        .map(|c| {
            if ILLEGAL_FILE_NAME_CHARS.contains(&c) || c.is_control() {
                FILE_NAME_PLACEHOLDER
            } else {
                c
            }
        })
        .collect()
}
