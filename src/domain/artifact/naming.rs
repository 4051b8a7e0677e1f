//! Suggested file names for downloaded recordings

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Prefix used when no context name is configured
pub const TIMESTAMP_PREFIX: &str = "gravacao";

/// How the name hint of a finished recording is built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileNaming {
    /// `<context-name> - <YYYY-MM-DD>`
    Context(String),
    /// `gravacao-<ISO timestamp>`
    #[default]
    Timestamp,
}

impl FileNaming {
    /// Use the context name when one is given and not blank
    pub fn from_context(context_name: Option<&str>) -> Self {
        match context_name.map(str::trim) {
            Some(name) if !name.is_empty() => Self::Context(name.to_string()),
            _ => Self::Timestamp,
        }
    }

    /// Name hint (without extension) for a recording finished at `now`
    pub fn name_hint(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::Context(name) => {
                let local: DateTime<Local> = now.with_timezone(&Local);
                format!("{} - {}", name, local.format("%Y-%m-%d"))
            }
            Self::Timestamp => format!(
                "{}-{}",
                TIMESTAMP_PREFIX,
                now.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
        }
    }
}
