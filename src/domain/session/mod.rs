mod state;

pub use state::{InvalidStateTransition, SessionEvent, SessionState};
