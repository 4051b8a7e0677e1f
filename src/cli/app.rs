//! Application runners: interactive session, file resend, device and format listings

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn, Level};

use crate::application::ports::{CaptureBackend, ConfigStore, FormFields, SubmitOutcome};
use crate::application::{
    list_input_devices, resubmit, ControllerExit, ControllerOptions, RecorderController,
    RecordingSession, SessionOptions,
};
use crate::domain::artifact::FileNaming;
use crate::domain::capture::probe_format;
use crate::domain::config::{AppConfig, DEFAULT_RESEND_FILE_FIELD, DEFAULT_RESEND_MARKER_FIELD};
use crate::infrastructure::{load_artifact, FileArtifactStore, HttpSubmissionSink, XdgConfigStore};

use super::input::spawn_stdin_reader;
use super::presenter::Presenter;
use super::signals::forward_signals;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Command queue depth between input sources and the controller
const COMMAND_BUFFER: usize = 16;

/// Install the stderr log subscriber. `verbose` is the `-v` count.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // A second install (tests, embedding) is not an error worth reporting.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load and merge configuration: defaults < file < CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    merged_config(&XdgConfigStore::new(), cli_config).await
}

async fn merged_config<C: ConfigStore>(store: &C, cli_config: AppConfig) -> AppConfig {
    let stored = match store.load_effective().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable config file");
            AppConfig::defaults()
        }
    };

    stored.merge(cli_config)
}

/// Run one interactive recording session until quit or submission
pub async fn run_session<B: CaptureBackend + 'static>(backend: B, config: AppConfig) -> ExitCode {
    let presenter = Presenter::new();

    let Some(endpoint) = config.endpoint.as_deref() else {
        presenter.error(
            "No endpoint configured. Pass --endpoint <URL> or run 'recform config set endpoint <URL>'",
        );
        return ExitCode::from(EXIT_USAGE_ERROR);
    };
    let sink = match HttpSubmissionSink::new(endpoint) {
        Ok(sink) => sink.with_fields(config.file_field_or_default(), config.marker_field_or_default()),
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    if let Err(e) = forward_signals(tx.clone()) {
        presenter.error(&format!("Failed to setup signal handler: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let selection = config.capture_config();
    let session = RecordingSession::new(
        Arc::new(backend),
        SessionOptions {
            formats: config.formats_or_default(),
            timeslice: config.timeslice_or_default(),
            naming: FileNaming::from_context(config.context_name.as_deref()),
        },
    );
    let options = ControllerOptions {
        submit_mode: config.submit_mode_or_default(),
        download: config.download_or_default(),
        warn_discarded_video: config.warn_discarded_video_or_default(),
        form: FormFields::from(config.form_fields()),
    };
    let store = FileArtifactStore::new(config.download_dir_or_default());

    info!(
        endpoint,
        mode = %options.submit_mode,
        sources = selection.source_count(),
        "Starting session"
    );
    presenter.info(&format!("Submitting to {}", endpoint));
    presenter.info("Type `help` for commands.");

    let controller =
        RecorderController::new(session, sink, store, presenter, options, selection, rx);
    if let Err(e) = spawn_stdin_reader(tx, controller.subscribe()) {
        Presenter::new().error(&format!("Failed to read commands: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let exit = controller.run().await;
    if let ControllerExit::Submitted { redirect_url: None } = exit {
        info!("Submitted without redirect");
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Send a recording saved earlier with the configured form fields
pub async fn run_send(
    config: &AppConfig,
    path: &Path,
    file_field: Option<&str>,
    marker_field: Option<&str>,
) -> ExitCode {
    let mut presenter = Presenter::new();

    let Some(endpoint) = config.endpoint.as_deref() else {
        presenter.error(
            "No endpoint configured. Pass --endpoint <URL> or run 'recform config set endpoint <URL>'",
        );
        return ExitCode::from(EXIT_USAGE_ERROR);
    };
    let sink = match HttpSubmissionSink::new(endpoint) {
        Ok(sink) => sink.with_fields(
            file_field.unwrap_or(DEFAULT_RESEND_FILE_FIELD),
            marker_field.unwrap_or(DEFAULT_RESEND_MARKER_FIELD),
        ),
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let artifact = match load_artifact(path).await {
        Ok(artifact) => artifact,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let form = FormFields::from(config.form_fields());
    match resubmit(&sink, &mut presenter, &form, &artifact).await {
        SubmitOutcome::Failure { .. } => ExitCode::from(EXIT_ERROR),
        SubmitOutcome::Success { .. } | SubmitOutcome::Document { .. } => {
            ExitCode::from(EXIT_SUCCESS)
        }
    }
}

/// Print input devices as `id: label`
pub async fn run_devices<B: CaptureBackend>(backend: B) -> ExitCode {
    let presenter = Presenter::new();

    match list_input_devices(&backend).await {
        Ok(devices) if devices.is_empty() => {
            presenter.warn("No microphone found.");
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(devices) => {
            for device in devices {
                presenter.key_value(&device.id, &device.label);
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Print each configured format with its support, then the one a session
/// would pick
pub fn run_formats<B: CaptureBackend>(backend: &B, config: &AppConfig) -> ExitCode {
    let presenter = Presenter::new();
    let candidates = config.formats_or_default();

    for candidate in &candidates {
        let supported = if backend.is_type_supported(candidate) {
            "supported"
        } else {
            "unsupported"
        };
        presenter.key_value(candidate, supported);
    }

    let chosen = probe_format(&candidates, |mime| backend.is_type_supported(mime));
    if chosen.is_empty() {
        presenter.error("No supported recording format.");
        return ExitCode::from(EXIT_ERROR);
    }
    presenter.success(&format!("Recording format: {}", chosen));
    ExitCode::from(EXIT_SUCCESS)
}
