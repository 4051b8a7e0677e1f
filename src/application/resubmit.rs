//! Submitting a recording made earlier

use tracing::{info, warn};

use crate::domain::artifact::Artifact;

use super::ports::{FormFields, StatusKind, SubmissionSink, SubmitOutcome, ViewSink};

/// Send an existing artifact with the form and show the outcome.
///
/// One attempt only; the caller decides what a failure means.
pub async fn resubmit<S, V>(
    sink: &S,
    view: &mut V,
    form: &FormFields,
    artifact: &Artifact,
) -> SubmitOutcome
where
    S: SubmissionSink,
    V: ViewSink,
{
    info!(
        file = artifact.suggested_file_name(),
        size = %artifact.human_readable_size(),
        "Submitting existing recording"
    );
    view.status(
        &format!("Submitting {}...", artifact.suggested_file_name()),
        StatusKind::Info,
    );

    let outcome = sink.submit(form, Some(artifact)).await;
    match &outcome {
        SubmitOutcome::Success { redirect_url } => {
            view.status("Submitted successfully.", StatusKind::Success);
            if let Some(url) = redirect_url {
                view.navigate(url);
            }
        }
        SubmitOutcome::Failure { message } => {
            warn!(%message, "Submission failed");
            view.status(message, StatusKind::Error);
        }
        SubmitOutcome::Document { html } => view.replace_document(html),
    }
    outcome
}
