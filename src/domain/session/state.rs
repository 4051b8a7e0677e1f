//! Recording session state machine

use std::fmt;
use thiserror::Error;

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AcquiringPermissions,
    Recording,
    Processing,
    Finished,
    Error,
}

/// Events that drive the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    Start,
    Acquired,
    Fail,
    Stop,
    Finalized,
    Cancel,
    Reset,
    Retry,
}

impl SessionState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AcquiringPermissions => "acquiring_permissions",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }

    /// Apply an event, returning the next state.
    ///
    /// State machine:
    ///   IDLE -> ACQUIRING_PERMISSIONS (start)
    ///   IDLE -> ERROR (fail: a start guard rejected the request)
    ///   ACQUIRING_PERMISSIONS -> RECORDING (acquired)
    ///   ACQUIRING_PERMISSIONS -> ERROR (fail)
    ///   ACQUIRING_PERMISSIONS -> IDLE (cancel)
    ///   RECORDING -> PROCESSING (stop)
    ///   RECORDING -> IDLE (cancel)
    ///   RECORDING -> ERROR (fail)
    ///   PROCESSING -> FINISHED (finalized)
    ///   PROCESSING -> ERROR (fail)
    ///   FINISHED -> IDLE (reset)
    ///   ERROR -> IDLE (retry)
    pub fn transition(self, event: SessionEvent) -> Result<Self, InvalidStateTransition> {
        use SessionEvent as E;
        use SessionState as S;

        let next = match (self, event) {
            (S::Idle, E::Start) => S::AcquiringPermissions,
            (S::Idle, E::Fail) => S::Error,
            (S::AcquiringPermissions, E::Acquired) => S::Recording,
            (S::AcquiringPermissions, E::Fail) => S::Error,
            (S::AcquiringPermissions, E::Cancel) => S::Idle,
            (S::Recording, E::Stop) => S::Processing,
            (S::Recording, E::Cancel) => S::Idle,
            (S::Recording, E::Fail) => S::Error,
            (S::Processing, E::Finalized) => S::Finished,
            (S::Processing, E::Fail) => S::Error,
            (S::Finished, E::Reset) => S::Idle,
            (S::Error, E::Retry) => S::Idle,
            (current_state, event) => {
                return Err(InvalidStateTransition {
                    current_state,
                    event,
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SessionEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Acquired => "complete acquisition",
            Self::Fail => "fail",
            Self::Stop => "stop",
            Self::Finalized => "finalize",
            Self::Cancel => "cancel",
            Self::Reset => "reset",
            Self::Retry => "retry",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state transition: cannot {event} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: SessionState,
    pub event: SessionEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn start_from_idle() {
        let next = SessionState::Idle.transition(SessionEvent::Start).unwrap();
        assert_eq!(next, SessionState::AcquiringPermissions);
    }

    #[test]
    fn start_while_recording_fails() {
        let err = SessionState::Recording
            .transition(SessionEvent::Start)
            .unwrap_err();
        assert_eq!(err.current_state, SessionState::Recording);
        assert_eq!(err.event, SessionEvent::Start);
        assert!(err.to_string().contains("cannot start while in recording"));
    }

    #[test]
    fn acquisition_outcomes() {
        let acquiring = SessionState::AcquiringPermissions;
        assert_eq!(acquiring.transition(SessionEvent::Acquired).unwrap(), SessionState::Recording);
        assert_eq!(acquiring.transition(SessionEvent::Fail).unwrap(), SessionState::Error);
        assert_eq!(acquiring.transition(SessionEvent::Cancel).unwrap(), SessionState::Idle);
    }

    #[test]
    fn stop_goes_through_processing() {
        let processing = SessionState::Recording.transition(SessionEvent::Stop).unwrap();
        assert_eq!(processing, SessionState::Processing);
        let finished = processing.transition(SessionEvent::Finalized).unwrap();
        assert_eq!(finished, SessionState::Finished);
    }

    #[test]
    fn cancel_bypasses_processing() {
        let next = SessionState::Recording.transition(SessionEvent::Cancel).unwrap();
        assert_eq!(next, SessionState::Idle);
    }

    #[test]
    fn cancel_from_finished_fails() {
        assert!(SessionState::Finished.transition(SessionEvent::Cancel).is_err());
    }

    #[test]
    fn reset_only_from_finished() {
        assert_eq!(SessionState::Finished.transition(SessionEvent::Reset).unwrap(), SessionState::Idle);
        assert!(SessionState::Error.transition(SessionEvent::Reset).is_err());
        assert!(SessionState::Recording.transition(SessionEvent::Reset).is_err());
    }

    #[test]
    fn retry_only_from_error() {
        assert_eq!(SessionState::Error.transition(SessionEvent::Retry).unwrap(), SessionState::Idle);
        assert!(SessionState::Idle.transition(SessionEvent::Retry).is_err());
    }

    #[test]
    fn guard_failure_from_idle_enters_error() {
        assert_eq!(SessionState::Idle.transition(SessionEvent::Fail).unwrap(), SessionState::Error);
    }

    #[test]
    fn full_cycle() {
        let mut state = SessionState::Idle;
        for event in [
            SessionEvent::Start,
            SessionEvent::Acquired,
            SessionEvent::Stop,
            SessionEvent::Finalized,
            SessionEvent::Reset,
        ] {
            state = state.transition(event).unwrap();
        }
        assert_eq!(state, SessionState::Idle);
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::AcquiringPermissions.to_string(), "acquiring_permissions");
        assert_eq!(format!("{}", SessionState::Finished), "finished");
    }
}
