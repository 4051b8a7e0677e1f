//! Application layer - Use cases and port interfaces
//!
//! Contains the recording session, the controller that drives it, and
//! the trait definitions for external system interactions.

pub mod acquire;
pub mod controller;
pub mod devices;
pub mod ports;
pub mod resubmit;
pub mod session;

// Re-export use cases
pub use acquire::{Acquisition, StreamAcquirer};
pub use controller::{Command, ControllerExit, ControllerOptions, RecorderController};
pub use devices::list_input_devices;
pub use resubmit::resubmit;
pub use session::{RecordingSession, SessionError, SessionOptions};
