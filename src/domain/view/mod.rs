//! View projection of session state
//!
//! `render` is a pure function of a [`SessionSnapshot`]; nothing here can
//! mutate a session.

use crate::domain::session::SessionState;

/// The UI region visible for a state. Exactly one is visible at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewRegion {
    Idle,
    Recording,
    Processing,
    Finished,
    Error,
}

impl ViewRegion {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }
}

/// Everything the view needs to know about a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub elapsed_seconds: u64,
    /// Extension of the resolved format, once probed
    pub format_extension: Option<String>,
    pub error_message: Option<String>,
    /// Suggested file name of the finished artifact
    pub artifact_name: Option<String>,
    pub artifact_size: Option<String>,
    /// At least one source is selected in the host's current settings
    pub source_selected: bool,
    /// A submission is in flight
    pub submitting: bool,
}

/// Visible region plus the enablement of every control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub region: ViewRegion,
    pub timer_text: String,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub cancel_enabled: bool,
    pub source_selection_enabled: bool,
    pub submit_enabled: bool,
    /// "Finalizing your recording in WEBM format."
    pub processing_text: Option<String>,
    /// Upper-case format label for the download control
    pub download_label: Option<String>,
    pub artifact_name: Option<String>,
    pub error_message: Option<String>,
    pub requesting_permissions: bool,
}

/// Region shown for each state
pub const fn region_for(state: SessionState) -> ViewRegion {
    match state {
        SessionState::Idle | SessionState::AcquiringPermissions => ViewRegion::Idle,
        SessionState::Recording => ViewRegion::Recording,
        SessionState::Processing => ViewRegion::Processing,
        SessionState::Finished => ViewRegion::Finished,
        SessionState::Error => ViewRegion::Error,
    }
}

/// Format seconds as `MM:SS`
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Project a snapshot onto the view.
pub fn render(snapshot: &SessionSnapshot) -> ViewModel {
    let state = snapshot.state;
    let idle = state == SessionState::Idle;
    let format_label = snapshot
        .format_extension
        .as_ref()
        .map(|ext| ext.to_uppercase());

    ViewModel {
        region: region_for(state),
        timer_text: format_elapsed(snapshot.elapsed_seconds),
        start_enabled: idle && snapshot.source_selected && !snapshot.submitting,
        stop_enabled: state == SessionState::Recording,
        cancel_enabled: matches!(
            state,
            SessionState::Recording | SessionState::AcquiringPermissions
        ),
        source_selection_enabled: idle,
        submit_enabled: matches!(state, SessionState::Idle | SessionState::Finished)
            && !snapshot.submitting,
        processing_text: match (state, &format_label) {
            (SessionState::Processing, Some(label)) => {
                Some(format!("Finalizing your recording in {} format.", label))
            }
            _ => None,
        },
        download_label: if state == SessionState::Finished {
            format_label
        } else {
            None
        },
        artifact_name: if state == SessionState::Finished {
            snapshot.artifact_name.clone()
        } else {
            None
        },
        error_message: if state == SessionState::Error {
            snapshot.error_message.clone()
        } else {
            None
        },
        requesting_permissions: state == SessionState::AcquiringPermissions,
    }
}
