//! Submission port interface

use async_trait::async_trait;

use crate::domain::artifact::Artifact;
use crate::domain::error::FormFieldParseError;

/// Generic message shown when a submission fails without a server message
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to submit. Please try again.";

/// Ordered form fields sent with a submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Repeated names are kept.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// First value for a name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `name=value` pair. The value may contain `=`.
    pub fn parse_pair(input: &str) -> Result<(String, String), FormFieldParseError> {
        match input.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.to_string()))
            }
            _ => Err(FormFieldParseError {
                input: input.to_string(),
            }),
        }
    }
}

impl From<Vec<(String, String)>> for FormFields {
    fn from(fields: Vec<(String, String)>) -> Self {
        Self(fields)
    }
}

impl Extend<(String, String)> for FormFields {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

/// Result of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Success { redirect_url: Option<String> },
    Failure { message: String },
    /// The server answered with a full page that replaces the current one
    Document { html: String },
}

impl SubmitOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn generic_failure() -> Self {
        Self::failure(GENERIC_FAILURE_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Port for delivering a form plus an optional recording
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Submit once. Never retries; every failure becomes
    /// [`SubmitOutcome::Failure`].
    async fn submit(&self, form: &FormFields, artifact: Option<&Artifact>) -> SubmitOutcome;
}
