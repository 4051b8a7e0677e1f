mod http;

pub use http::{HttpSubmissionSink, SubmissionError};
