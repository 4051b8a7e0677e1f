//! HTTP form submission adapter

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::ports::{FormFields, SubmissionSink, SubmitOutcome};
use crate::domain::artifact::Artifact;
use crate::domain::config::{DEFAULT_FILE_FIELD, DEFAULT_MARKER_FIELD};

/// Header identifying the request as a scripted submission
const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// Errors inside the adapter. Never leave it: each one becomes
/// [`SubmitOutcome::Failure`].
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Request failed: {0}")]
    TransportFailure(String),

    #[error("Server answered with HTTP {0}")]
    Status(u16),
}

/// Structured response body
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    success: bool,
    message: Option<String>,
    redirect_url: Option<String>,
}

/// Submits as one `multipart/form-data` POST
pub struct HttpSubmissionSink {
    endpoint: Url,
    client: Client,
    file_field: String,
    marker_field: String,
}

impl HttpSubmissionSink {
    /// Sink for `endpoint` with the default field names
    pub fn new(endpoint: &str) -> Result<Self, SubmissionError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| SubmissionError::InvalidEndpoint(e.to_string()))?;

        // Redirects are answered, not followed.
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| SubmissionError::TransportFailure(e.to_string()))?;

        Ok(Self {
            endpoint,
            client,
            file_field: DEFAULT_FILE_FIELD.to_string(),
            marker_field: DEFAULT_MARKER_FIELD.to_string(),
        })
    }

    /// Override the file and marker field names
    pub fn with_fields(
        mut self,
        file_field: impl Into<String>,
        marker_field: impl Into<String>,
    ) -> Self {
        self.file_field = file_field.into();
        self.marker_field = marker_field.into();
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn build_form(
        &self,
        fields: &FormFields,
        artifact: Option<&Artifact>,
    ) -> Result<Form, SubmissionError> {
        let mut form = Form::new();
        for (name, value) in fields.iter() {
            form = form.text(name.to_string(), value.to_string());
        }

        if let Some(artifact) = artifact {
            let part = Part::bytes(artifact.bytes().to_vec())
                .file_name(artifact.suggested_file_name().to_string())
                .mime_str(artifact.mime_type().as_str())
                .map_err(|e| SubmissionError::TransportFailure(e.to_string()))?;
            form = form
                .part(self.file_field.clone(), part)
                .text(self.marker_field.clone(), "true");
        }

        Ok(form)
    }

    /// Resolve a `Location` header against the endpoint
    fn resolve_location(&self, location: &str) -> String {
        self.endpoint
            .join(location)
            .map(String::from)
            .unwrap_or_else(|_| location.to_string())
    }

    async fn send(
        &self,
        fields: &FormFields,
        artifact: Option<&Artifact>,
    ) -> Result<SubmitOutcome, SubmissionError> {
        let form = self.build_form(fields, artifact)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubmissionError::TransportFailure(e.to_string()))?;

        self.interpret(response).await
    }

    async fn interpret(&self, response: Response) -> Result<SubmitOutcome, SubmissionError> {
        let status = response.status();

        if status.is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                let redirect_url = self.resolve_location(location);
                debug!(%redirect_url, "Submission redirected");
                return Ok(SubmitOutcome::Success {
                    redirect_url: Some(redirect_url),
                });
            }
        }

        if !status.is_success() {
            return Err(SubmissionError::Status(status.as_u16()));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));

        if is_json {
            let body: SubmitResponse = response
                .json()
                .await
                .map_err(|e| SubmissionError::TransportFailure(e.to_string()))?;
            return Ok(self.outcome_from_json(body));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SubmissionError::TransportFailure(e.to_string()))?;
        Ok(SubmitOutcome::Document { html })
    }

    fn outcome_from_json(&self, body: SubmitResponse) -> SubmitOutcome {
        if body.success {
            SubmitOutcome::Success {
                redirect_url: body
                    .redirect_url
                    .filter(|url| !url.is_empty())
                    .map(|url| self.resolve_location(&url)),
            }
        } else {
            match body.message.filter(|message| !message.trim().is_empty()) {
                Some(message) => SubmitOutcome::failure(message),
                None => SubmitOutcome::generic_failure(),
            }
        }
    }
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn submit(&self, form: &FormFields, artifact: Option<&Artifact>) -> SubmitOutcome {
        info!(
            endpoint = %self.endpoint,
            fields = form.len(),
            with_audio = artifact.is_some(),
            "Submitting form"
        );
        match self.send(form, artifact).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Submission failed");
                SubmitOutcome::generic_failure()
            }
        }
    }
}
