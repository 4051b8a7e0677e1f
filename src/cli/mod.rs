//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, stdin command input,
//! signal handling, and the application runners.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod input;
pub mod presenter;
pub mod signals;

// Re-export commonly used types
pub use app::{
    run_devices, run_formats, run_send, run_session, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR,
};
pub use args::{Cli, Commands, ConfigAction};
pub use presenter::Presenter;
