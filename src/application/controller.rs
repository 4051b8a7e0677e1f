//! Session controller
//!
//! Owns one [`RecordingSession`] and every collaborator around it, and turns
//! user commands into session operations. All work happens on the task that
//! calls [`RecorderController::run`].

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::capture::{CaptureConfig, SourceChange};
use crate::domain::config::SubmitMode;
use crate::domain::error::CaptureError;
use crate::domain::session::SessionState;
use crate::domain::view::{render, SessionSnapshot, ViewModel};

use super::ports::{
    ArtifactStore, CaptureBackend, DownloadHandle, FormFields, StatusKind, SubmissionSink,
    SubmitOutcome, ViewSink,
};
use super::session::{RecordingSession, SessionError};

/// Shown when a display capture brought video along
pub const DISCARDED_VIDEO_WARNING: &str =
    "Screen video is not recorded. Only the shared audio is captured.";

/// User commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Change one capture source (before recording only)
    SelectSource(SourceChange),
    Start,
    Stop,
    Cancel { confirmed: bool },
    /// Record again after finishing
    Reset,
    Retry,
    Submit,
    Shutdown,
}

/// Why the controller stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerExit {
    Shutdown,
    Submitted { redirect_url: Option<String> },
    /// The server's response replaced the page
    Replaced,
}

/// Behavior switches for a controller
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub submit_mode: SubmitMode,
    /// Save a copy of every finished recording
    pub download: bool,
    pub warn_discarded_video: bool,
    /// Static fields sent with every submission
    pub form: FormFields,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            submit_mode: SubmitMode::default(),
            download: true,
            warn_discarded_video: true,
            form: FormFields::new(),
        }
    }
}

enum Flow {
    Continue,
    Exit(ControllerExit),
}

enum StartOutcome {
    Done(Result<(), SessionError>),
    Aborted,
    Shutdown,
}

/// Drives one recording session from user commands
pub struct RecorderController<B, S, A, V>
where
    B: CaptureBackend,
    S: SubmissionSink,
    A: ArtifactStore,
    V: ViewSink,
{
    session: RecordingSession<B>,
    sink: S,
    store: A,
    view: V,
    options: ControllerOptions,
    selection: CaptureConfig,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<SessionState>,
    download: Option<DownloadHandle>,
    submitting: bool,
}

impl<B, S, A, V> RecorderController<B, S, A, V>
where
    B: CaptureBackend,
    S: SubmissionSink,
    A: ArtifactStore,
    V: ViewSink,
{
    pub fn new(
        session: RecordingSession<B>,
        sink: S,
        store: A,
        view: V,
        options: ControllerOptions,
        selection: CaptureConfig,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            session,
            sink,
            store,
            view,
            options,
            selection,
            commands,
            state: watch::channel(SessionState::Idle).0,
            download: None,
            submitting: false,
        }
    }

    pub fn session(&self) -> &RecordingSession<B> {
        &self.session
    }

    /// Follow the session state as the view sees it
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Process commands until shutdown or a completed submission.
    pub async fn run(mut self) -> ControllerExit {
        self.refresh();

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let was_recording = self.session.state() == SessionState::Recording;

            let flow = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => Flow::Exit(self.shutdown()),
                },
                event = self.session.next_event() => {
                    if let Err(e) = self.session.handle_event(event) {
                        self.report(&e);
                    }
                    self.refresh();
                    Flow::Continue
                }
                _ = ticker.tick(), if was_recording => {
                    self.session.tick();
                    self.refresh();
                    Flow::Continue
                }
            };

            if let Flow::Exit(exit) = flow {
                info!(?exit, "Controller finished");
                return exit;
            }

            if !was_recording && self.session.state() == SessionState::Recording {
                ticker.reset();
            }
        }
    }

    async fn handle(&mut self, command: Command) -> Flow {
        debug!(?command, state = %self.session.state(), "Command");
        match command {
            Command::SelectSource(change) => {
                if self.render().source_selection_enabled {
                    self.selection.apply(change);
                } else {
                    self.view.status(
                        "Sources can only be changed before recording.",
                        StatusKind::Warning,
                    );
                }
                self.refresh();
                Flow::Continue
            }
            Command::Start => self.start().await,
            Command::Stop => {
                if self.session.state() != SessionState::Recording {
                    debug!("Stop ignored outside recording");
                    return Flow::Continue;
                }
                self.show_pending(SessionState::Processing);
                match self.session.stop().await {
                    Ok(()) => self.on_finished().await,
                    Err(e) => {
                        self.report(&e);
                        self.refresh();
                        Flow::Continue
                    }
                }
            }
            Command::Cancel { confirmed } => {
                match self.session.cancel(confirmed) {
                    Ok(true) => self.view.status("Recording discarded.", StatusKind::Info),
                    Ok(false) => {}
                    Err(e) => self.report(&e),
                }
                self.refresh();
                Flow::Continue
            }
            Command::Reset => {
                match self.session.reset() {
                    Ok(()) => self.release_download(),
                    Err(e) => self.report(&e),
                }
                self.refresh();
                Flow::Continue
            }
            Command::Retry => {
                if let Err(e) = self.session.retry() {
                    self.report(&e);
                }
                self.refresh();
                Flow::Continue
            }
            Command::Submit => self.submit().await,
            Command::Shutdown => Flow::Exit(self.shutdown()),
        }
    }

    async fn start(&mut self) -> Flow {
        if !self.render().start_enabled {
            if self.session.state() == SessionState::Idle && self.selection.validate().is_err() {
                self.view.status(
                    &CaptureError::NoSourceSelected.to_string(),
                    StatusKind::Error,
                );
            } else {
                debug!(state = %self.session.state(), "Start ignored");
            }
            return Flow::Continue;
        }

        self.show_pending(SessionState::AcquiringPermissions);

        // Commands keep arriving while the user answers the permission
        // prompt. Only cancel and shutdown are honored there.
        let outcome = {
            let start = self.session.start(&self.selection);
            tokio::pin!(start);
            loop {
                tokio::select! {
                    biased;
                    result = &mut start => break StartOutcome::Done(result),
                    command = self.commands.recv() => match command {
                        Some(Command::Cancel { .. }) => break StartOutcome::Aborted,
                        Some(Command::Shutdown) | None => break StartOutcome::Shutdown,
                        Some(other) => debug!(command = ?other, "Ignored while acquiring"),
                    },
                }
            }
        };

        match outcome {
            StartOutcome::Done(Ok(())) => {
                if self.options.warn_discarded_video && self.session.discarded_video_tracks() > 0 {
                    self.view.status(DISCARDED_VIDEO_WARNING, StatusKind::Warning);
                }
            }
            StartOutcome::Done(Err(e)) => self.report(&e),
            StartOutcome::Aborted => {
                self.abort_pending_start();
                self.view.status("Recording request cancelled.", StatusKind::Info);
            }
            StartOutcome::Shutdown => {
                self.abort_pending_start();
                return Flow::Exit(self.shutdown());
            }
        }
        self.refresh();
        Flow::Continue
    }

    fn abort_pending_start(&mut self) {
        if self.session.state() == SessionState::AcquiringPermissions {
            if let Err(e) = self.session.abort_acquisition() {
                warn!(error = %e, "Failed to abort acquisition");
            }
        }
    }

    async fn on_finished(&mut self) -> Flow {
        if self.options.download {
            if let Some(artifact) = self.session.artifact() {
                match self.store.save(artifact).await {
                    Ok(handle) => {
                        self.view.status(
                            &format!("Recording saved to {}", handle.path().display()),
                            StatusKind::Success,
                        );
                        self.release_download();
                        self.download = Some(handle);
                    }
                    Err(e) => {
                        warn!(error = %e, "Download failed");
                        self.view.status(&e.to_string(), StatusKind::Error);
                    }
                }
            }
        }
        self.refresh();

        match self.options.submit_mode {
            SubmitMode::Auto => self.submit().await,
            SubmitMode::Manual => {
                self.view
                    .status("Recording ready. Submit when you are done.", StatusKind::Info);
                Flow::Continue
            }
        }
    }

    async fn submit(&mut self) -> Flow {
        if !self.render().submit_enabled {
            self.view.status(
                "Finish the recording before submitting.",
                StatusKind::Warning,
            );
            return Flow::Continue;
        }

        self.submitting = true;
        self.refresh();
        self.view.status("Submitting...", StatusKind::Info);

        let outcome = self
            .sink
            .submit(&self.options.form, self.session.artifact())
            .await;
        self.submitting = false;

        match outcome {
            SubmitOutcome::Success { redirect_url } => {
                info!(redirect = ?redirect_url, "Submission accepted");
                self.view.status("Submitted successfully.", StatusKind::Success);
                if let Some(url) = &redirect_url {
                    self.view.navigate(url);
                }
                self.teardown();
                Flow::Exit(ControllerExit::Submitted { redirect_url })
            }
            SubmitOutcome::Failure { message } => {
                warn!(%message, "Submission failed");
                self.view.status(&message, StatusKind::Error);
                self.refresh();
                Flow::Continue
            }
            SubmitOutcome::Document { html } => {
                info!(bytes = html.len(), "Submission returned a document");
                self.view.replace_document(&html);
                self.teardown();
                Flow::Exit(ControllerExit::Replaced)
            }
        }
    }

    fn shutdown(&mut self) -> ControllerExit {
        if self.session.state() == SessionState::Recording {
            if let Err(e) = self.session.cancel(true) {
                warn!(error = %e, "Failed to cancel recording on shutdown");
            }
        }
        self.teardown();
        ControllerExit::Shutdown
    }

    fn teardown(&mut self) {
        self.release_download();
        self.session.cleanup();
    }

    fn release_download(&mut self) {
        if let Some(handle) = self.download.take() {
            self.store.release(handle);
        }
    }

    fn report(&mut self, error: &SessionError) {
        match error {
            SessionError::Capture(e) => self.view.status(&e.to_string(), StatusKind::Error),
            SessionError::InvalidState(e) => {
                debug!(error = %e, "Command rejected");
                self.view.status(&e.to_string(), StatusKind::Warning);
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            source_selected: self.selection.source_count() > 0,
            submitting: self.submitting,
            ..self.session.snapshot()
        }
    }

    fn render(&self) -> ViewModel {
        render(&self.snapshot())
    }

    fn refresh(&mut self) {
        let view = self.render();
        self.view.show(&view);
        self.state.send_replace(self.session.state());
    }

    /// Show a state the session enters inside an awaited operation
    fn show_pending(&mut self, state: SessionState) {
        let snapshot = SessionSnapshot {
            state,
            ..self.snapshot()
        };
        self.view.show(&render(&snapshot));
        self.state.send_replace(state);
    }
}
