//! recform - audio recording attached to form submissions
//!
//! Records the microphone, system audio, or both, packages the result as a
//! single file and submits it together with a form to an HTTP endpoint.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Session state machine, formats, artifacts, view projection, errors
//! - **Application**: Port interfaces (traits), the recording session and its controller
//! - **Infrastructure**: Adapter implementations (cpal capture, HTTP submission, files, config)
//! - **CLI**: Command-line interface, argument parsing, stdin commands and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
