//! Encoding format value object and capability probing

use std::fmt;

/// Format preference list used when none is configured.
///
/// Container/codec pairs come first so environments that can encode Opus
/// pick it; the bare containers and lossless formats follow as fallbacks.
pub const DEFAULT_FORMAT_PREFERENCES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/ogg;codecs=opus",
    "audio/webm",
    "audio/ogg",
    "audio/mp4",
    "audio/flac",
    "audio/wav",
];

/// MIME type an encoder is bound to.
///
/// The empty format means "no usable format" and is a terminal failure
/// for the session that probed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EncodingFormat(String);

impl EncodingFormat {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self(mime_type.into())
    }

    /// The "no usable format" marker
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Full MIME string including parameters
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Subtype token: the part after `/` and before any `;` parameter.
    pub fn subtype(&self) -> &str {
        let essence = self.essence();
        match essence.split_once('/') {
            Some((_, subtype)) => subtype.trim(),
            None => "",
        }
    }

    /// `type/subtype` without parameters
    pub fn essence(&self) -> &str {
        self.0.split(';').next().unwrap_or_default().trim()
    }

    /// Value of the `codecs` parameter, if any
    pub fn codecs(&self) -> Option<&str> {
        self.0.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("codecs") {
                Some(value.trim().trim_matches('"'))
            } else {
                None
            }
        })
    }

    /// File extension derived from the subtype alone
    pub fn extension(&self) -> &str {
        self.subtype()
    }

    /// Format of an existing audio file, judged by its extension
    pub fn for_extension(extension: &str) -> Option<Self> {
        let mime_type = match extension.trim_start_matches('.').to_lowercase().as_str() {
            "wav" | "wave" => "audio/wav",
            "flac" => "audio/flac",
            "webm" | "weba" => "audio/webm",
            "ogg" | "oga" | "opus" => "audio/ogg",
            "mp4" | "m4a" => "audio/mp4",
            "mp3" | "mpeg" => "audio/mpeg",
            _ => return None,
        };
        Some(Self::new(mime_type))
    }
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Return the first candidate the environment reports as encodable, or
/// [`EncodingFormat::empty`] when none is.
///
/// Must run before any stream is acquired.
pub fn probe_format<S, F>(candidates: &[S], is_supported: F) -> EncodingFormat
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|candidate| !candidate.trim().is_empty() && is_supported(candidate))
        .map(EncodingFormat::new)
        .unwrap_or_default()
}
