mod app_config;

pub use app_config::{
    AppConfig, InvalidSubmitMode, SubmitMode, DEFAULT_FILE_FIELD, DEFAULT_MARKER_FIELD,
    DEFAULT_RESEND_FILE_FIELD, DEFAULT_RESEND_MARKER_FIELD, DEFAULT_TIMESLICE_MS,
};
