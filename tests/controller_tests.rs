//! Controller tests with in-memory collaborators
//!
//! Commands are queued before the controller runs; closing the queue shuts
//! it down, so every run terminates on its own.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use recform::application::controller::DISCARDED_VIDEO_WARNING;
use recform::application::ports::{
    ArtifactStore, DownloadHandle, FormFields, StatusKind, StoreError, SubmissionSink,
    SubmitOutcome, ViewSink,
};
use recform::application::{
    resubmit, Command, ControllerExit, ControllerOptions, RecorderController, RecordingSession,
    SessionOptions,
};
use recform::domain::artifact::{package, Artifact};
use recform::domain::capture::{CaptureConfig, EncodingFormat, SourceChange};
use recform::domain::config::SubmitMode;
use recform::domain::error::CaptureError;
use recform::domain::session::SessionState;
use recform::domain::view::{ViewModel, ViewRegion};
use recform::infrastructure::capture::ScriptProbe;
use recform::infrastructure::ScriptedBackend;

/// What the sink was asked to submit
#[derive(Debug, Clone)]
struct Submission {
    csrf: Option<String>,
    artifact: Option<Vec<u8>>,
}

#[derive(Clone, Default)]
struct FakeSink {
    outcomes: Arc<Mutex<VecDeque<SubmitOutcome>>>,
    received: Arc<Mutex<Vec<Submission>>>,
}

impl FakeSink {
    fn answering(outcomes: Vec<SubmitOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            ..Self::default()
        }
    }

    fn received(&self) -> Vec<Submission> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionSink for FakeSink {
    async fn submit(&self, form: &FormFields, artifact: Option<&Artifact>) -> SubmitOutcome {
        self.received.lock().unwrap().push(Submission {
            csrf: form.get("csrf").map(str::to_string),
            artifact: artifact.map(|a| a.bytes().to_vec()),
        });
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmitOutcome::Success { redirect_url: None })
    }
}

#[derive(Clone, Default)]
struct FakeStore {
    saved: Arc<Mutex<Vec<String>>>,
    released: Arc<Mutex<usize>>,
    fail: bool,
}

impl FakeStore {
    fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn save(&self, artifact: &Artifact) -> Result<DownloadHandle, StoreError> {
        if self.fail {
            return Err(StoreError::WriteFailed("read-only".into()));
        }
        let name = artifact.suggested_file_name().to_string();
        self.saved.lock().unwrap().push(name.clone());
        Ok(DownloadHandle::new(format!("/downloads/{}", name)))
    }

    fn release(&self, _handle: DownloadHandle) {
        *self.released.lock().unwrap() += 1;
    }
}

#[derive(Default)]
struct ViewLog {
    views: Vec<ViewModel>,
    statuses: Vec<(String, StatusKind)>,
    navigated: Vec<String>,
    documents: Vec<String>,
}

#[derive(Clone, Default)]
struct FakeView {
    log: Arc<Mutex<ViewLog>>,
}

impl FakeView {
    fn has_status(&self, needle: &str, kind: StatusKind) -> bool {
        self.log
            .lock()
            .unwrap()
            .statuses
            .iter()
            .any(|(message, k)| *k == kind && message.contains(needle))
    }

    fn last_region(&self) -> Option<ViewRegion> {
        self.log.lock().unwrap().views.last().map(|v| v.region)
    }

    fn regions(&self) -> Vec<ViewRegion> {
        self.log.lock().unwrap().views.iter().map(|v| v.region).collect()
    }
}

impl ViewSink for FakeView {
    fn show(&mut self, view: &ViewModel) {
        self.log.lock().unwrap().views.push(view.clone());
    }

    fn status(&mut self, message: &str, kind: StatusKind) {
        self.log
            .lock()
            .unwrap()
            .statuses
            .push((message.to_string(), kind));
    }

    fn navigate(&mut self, url: &str) {
        self.log.lock().unwrap().navigated.push(url.to_string());
    }

    fn replace_document(&mut self, html: &str) {
        self.log.lock().unwrap().documents.push(html.to_string());
    }
}

struct Harness {
    sink: FakeSink,
    store: FakeStore,
    view: FakeView,
    probe: ScriptProbe,
    state: watch::Receiver<SessionState>,
}

async fn run(
    backend: ScriptedBackend,
    sink: FakeSink,
    store: FakeStore,
    options: ControllerOptions,
    commands: Vec<Command>,
) -> (ControllerExit, Harness) {
    let probe = backend.probe();
    let view = FakeView::default();
    let session = RecordingSession::new(Arc::new(backend), SessionOptions::default());

    let (tx, rx) = mpsc::channel(commands.len().max(1));
    for command in commands {
        tx.send(command).await.unwrap();
    }
    drop(tx);

    let controller = RecorderController::new(
        session,
        sink.clone(),
        store.clone(),
        view.clone(),
        options,
        CaptureConfig::microphone(),
        rx,
    );
    let state = controller.subscribe();
    let exit = controller.run().await;

    (
        exit,
        Harness {
            sink,
            store,
            view,
            probe,
            state,
        },
    )
}

fn manual() -> ControllerOptions {
    ControllerOptions {
        form: FormFields::new().with("csrf", "token"),
        ..ControllerOptions::default()
    }
}

fn auto() -> ControllerOptions {
    ControllerOptions {
        submit_mode: SubmitMode::Auto,
        ..manual()
    }
}

#[tokio::test]
async fn manual_mode_waits_for_submit() {
    let (exit, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![Command::Start, Command::Stop],
    )
    .await;

    assert_eq!(exit, ControllerExit::Shutdown);
    assert!(h.sink.received().is_empty());
    assert_eq!(h.store.saved().len(), 1);
    assert!(h.store.saved()[0].ends_with(".webm"));
    // The queue closing released the download handle.
    assert_eq!(*h.store.released.lock().unwrap(), 1);
    assert_eq!(h.view.last_region(), Some(ViewRegion::Finished));
    assert!(h.view.has_status("Recording ready", StatusKind::Info));
    assert!(h.probe.all_released());
}

#[tokio::test]
async fn manual_submit_sends_recording_and_form() {
    let sink = FakeSink::answering(vec![SubmitOutcome::Success {
        redirect_url: Some("https://example.com/done".into()),
    }]);
    let (exit, h) = run(
        ScriptedBackend::new(),
        sink,
        FakeStore::default(),
        manual(),
        vec![Command::Start, Command::Stop, Command::Submit],
    )
    .await;

    assert_eq!(
        exit,
        ControllerExit::Submitted {
            redirect_url: Some("https://example.com/done".into())
        }
    );
    let received = h.sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].csrf.as_deref(), Some("token"));
    assert_eq!(received[0].artifact.as_deref(), Some(&[1, 2, 3, 4, 5, 6][..]));
    assert_eq!(
        h.view.log.lock().unwrap().navigated,
        vec!["https://example.com/done".to_string()]
    );
}

#[tokio::test]
async fn auto_mode_submits_after_stop() {
    let (exit, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        auto(),
        vec![Command::Start, Command::Stop],
    )
    .await;

    assert_eq!(exit, ControllerExit::Submitted { redirect_url: None });
    assert_eq!(h.sink.received().len(), 1);
    // Downloaded before submitting.
    assert_eq!(h.store.saved().len(), 1);
    assert!(h.view.log.lock().unwrap().navigated.is_empty());
}

#[tokio::test]
async fn failed_submission_keeps_recording_for_retry() {
    let sink = FakeSink::answering(vec![
        SubmitOutcome::failure("Form is closed"),
        SubmitOutcome::Success { redirect_url: None },
    ]);
    let (exit, h) = run(
        ScriptedBackend::new(),
        sink,
        FakeStore::default(),
        auto(),
        vec![Command::Start, Command::Stop, Command::Submit],
    )
    .await;

    assert_eq!(exit, ControllerExit::Submitted { redirect_url: None });
    assert!(h.view.has_status("Form is closed", StatusKind::Error));

    let received = h.sink.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].artifact, received[1].artifact);
    assert!(received[1].artifact.is_some());
}

#[tokio::test]
async fn document_response_replaces_page() {
    let sink = FakeSink::answering(vec![SubmitOutcome::Document {
        html: "<h1>Thanks</h1>".into(),
    }]);
    let (exit, h) = run(
        ScriptedBackend::new(),
        sink,
        FakeStore::default(),
        auto(),
        vec![Command::Start, Command::Stop],
    )
    .await;

    assert_eq!(exit, ControllerExit::Replaced);
    assert_eq!(
        h.view.log.lock().unwrap().documents,
        vec!["<h1>Thanks</h1>".to_string()]
    );
}

#[tokio::test]
async fn submit_without_recording_sends_form_only() {
    let (exit, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![Command::Submit],
    )
    .await;

    assert_eq!(exit, ControllerExit::Submitted { redirect_url: None });
    let received = h.sink.received();
    assert_eq!(received.len(), 1);
    assert!(received[0].artifact.is_none());
    assert_eq!(h.probe.streams_opened(), 0);
}

#[tokio::test]
async fn submit_is_refused_while_recording() {
    let (exit, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![Command::Start, Command::Submit],
    )
    .await;

    assert_eq!(exit, ControllerExit::Shutdown);
    assert!(h.sink.received().is_empty());
    assert!(h.view.has_status("Finish the recording", StatusKind::Warning));
}

#[tokio::test]
async fn cancel_during_permission_prompt_returns_to_idle() {
    let (exit, h) = run(
        ScriptedBackend::new().with_pending_permission(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![Command::Start, Command::Cancel { confirmed: true }],
    )
    .await;

    assert_eq!(exit, ControllerExit::Shutdown);
    assert!(h.view.has_status("Recording request cancelled", StatusKind::Info));
    assert!(h
        .view
        .log
        .lock()
        .unwrap()
        .views
        .iter()
        .any(|v| v.requesting_permissions));
    assert_eq!(h.view.last_region(), Some(ViewRegion::Idle));
    assert!(h.probe.all_released());
}

#[tokio::test]
async fn shutdown_during_permission_prompt_exits() {
    let (exit, h) = run(
        ScriptedBackend::new().with_pending_permission(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![Command::Start, Command::Stop, Command::Shutdown],
    )
    .await;

    assert_eq!(exit, ControllerExit::Shutdown);
    assert!(h.sink.received().is_empty());
    assert!(h.probe.all_released());
}

#[tokio::test]
async fn shutdown_discards_recording_in_progress() {
    let (exit, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        auto(),
        vec![Command::Start, Command::Shutdown],
    )
    .await;

    assert_eq!(exit, ControllerExit::Shutdown);
    assert!(h.sink.received().is_empty());
    assert!(h.store.saved().is_empty());
    assert!(h.probe.all_released());
}

#[tokio::test]
async fn start_without_sources_is_refused() {
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![
            Command::SelectSource(SourceChange::Microphone(false)),
            Command::Start,
        ],
    )
    .await;

    assert!(h.view.has_status(
        &CaptureError::NoSourceSelected.to_string(),
        StatusKind::Error
    ));
    assert_eq!(h.probe.streams_opened(), 0);
    let log = h.view.log.lock().unwrap();
    assert!(log.views.first().is_some_and(|v| v.start_enabled));
    assert!(log.views.last().is_some_and(|v| !v.start_enabled));
}

#[tokio::test]
async fn discarded_video_is_reported() {
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![
            Command::SelectSource(SourceChange::SystemAudio(true)),
            Command::Start,
            Command::Stop,
        ],
    )
    .await;

    assert!(h.view.has_status(DISCARDED_VIDEO_WARNING, StatusKind::Warning));
    assert_eq!(h.probe.mixes(), 1);
}

#[tokio::test]
async fn discarded_video_warning_can_be_disabled() {
    let options = ControllerOptions {
        warn_discarded_video: false,
        ..manual()
    };
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        options,
        vec![
            Command::SelectSource(SourceChange::SystemAudio(true)),
            Command::Start,
        ],
    )
    .await;

    assert!(!h.view.has_status(DISCARDED_VIDEO_WARNING, StatusKind::Warning));
}

#[tokio::test]
async fn sources_are_locked_while_recording() {
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![
            Command::Start,
            Command::SelectSource(SourceChange::SystemAudio(true)),
            Command::Stop,
        ],
    )
    .await;

    assert!(h.view.has_status("Sources can only be changed", StatusKind::Warning));
    assert_eq!(h.probe.streams_opened(), 1);
}

#[tokio::test]
async fn refused_source_change_is_not_kept() {
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![
            Command::Start,
            Command::SelectSource(SourceChange::SystemAudio(true)),
            Command::Stop,
            Command::Reset,
            Command::SelectSource(SourceChange::Microphone(false)),
            Command::Start,
        ],
    )
    .await;

    assert!(h.view.has_status("Sources can only be changed", StatusKind::Warning));
    // System audio was refused, so dropping the microphone leaves nothing.
    assert!(h.view.has_status(
        &CaptureError::NoSourceSelected.to_string(),
        StatusKind::Error
    ));
    assert_eq!(h.probe.streams_opened(), 1);
    assert_eq!(h.probe.mixes(), 0);
}

#[tokio::test]
async fn device_change_applies_before_start() {
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![
            Command::SelectSource(SourceChange::Device(Some("gone".into()))),
            Command::Start,
        ],
    )
    .await;

    assert!(h.view.has_status(
        &CaptureError::DeviceUnavailable("gone".into()).to_string(),
        StatusKind::Error
    ));
    assert_eq!(h.probe.streams_opened(), 0);
}

#[tokio::test]
async fn state_is_published() {
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![Command::Start, Command::Stop],
    )
    .await;

    assert_eq!(*h.state.borrow(), SessionState::Finished);
}

#[tokio::test]
async fn empty_recording_is_still_submitted() {
    let (exit, h) = run(
        ScriptedBackend::new().with_chunks(Vec::new()),
        FakeSink::default(),
        FakeStore::default(),
        auto(),
        vec![Command::Start, Command::Stop],
    )
    .await;

    assert_eq!(exit, ControllerExit::Submitted { redirect_url: None });
    assert_eq!(h.store.saved().len(), 1);
    let received = h.sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].artifact.as_deref(), Some(&[][..]));
}

#[tokio::test]
async fn download_can_be_disabled() {
    let options = ControllerOptions {
        download: false,
        ..manual()
    };
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        options,
        vec![Command::Start, Command::Stop],
    )
    .await;

    assert!(h.store.saved().is_empty());
    assert_eq!(h.view.last_region(), Some(ViewRegion::Finished));
}

#[tokio::test]
async fn failed_download_still_finishes() {
    let store = FakeStore {
        fail: true,
        ..FakeStore::default()
    };
    let (exit, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        store,
        auto(),
        vec![Command::Start, Command::Stop],
    )
    .await;

    assert!(h.view.has_status("read-only", StatusKind::Error));
    assert_eq!(exit, ControllerExit::Submitted { redirect_url: None });
}

#[tokio::test]
async fn permission_denied_shows_error_then_retry() {
    let (_, h) = run(
        ScriptedBackend::new().with_permission_denied(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![Command::Start, Command::Retry],
    )
    .await;

    assert!(h.view.has_status(
        &CaptureError::PermissionDenied.to_string(),
        StatusKind::Error
    ));
    let regions = h.view.regions();
    assert!(regions.contains(&ViewRegion::Error));
    assert_eq!(regions.last(), Some(&ViewRegion::Idle));
}

#[tokio::test]
async fn record_again_after_finishing() {
    let (_, h) = run(
        ScriptedBackend::new(),
        FakeSink::default(),
        FakeStore::default(),
        manual(),
        vec![
            Command::Start,
            Command::Stop,
            Command::Reset,
            Command::Start,
            Command::Stop,
        ],
    )
    .await;

    assert_eq!(h.store.saved().len(), 2);
    assert_eq!(h.probe.streams_opened(), 2);
    assert!(h.probe.all_released());
}

#[tokio::test]
async fn resubmitted_file_follows_redirect() {
    let sink = FakeSink::answering(vec![SubmitOutcome::Success {
        redirect_url: Some("https://forms.example/done".to_string()),
    }]);
    let mut view = FakeView::default();
    let artifact = package(&[b"fLaC".to_vec()], &EncodingFormat::new("audio/flac"), "visit");
    let form = FormFields::new().with("csrf", "abc");

    let outcome = resubmit(&sink, &mut view, &form, &artifact).await;

    assert!(outcome.is_success());
    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].csrf.as_deref(), Some("abc"));
    assert_eq!(received[0].artifact.as_deref(), Some(&b"fLaC"[..]));
    assert!(view.has_status("Submitting visit.flac", StatusKind::Info));
    assert_eq!(
        view.log.lock().unwrap().navigated,
        vec!["https://forms.example/done".to_string()]
    );
}

#[tokio::test]
async fn resubmit_failure_is_shown() {
    let sink = FakeSink::answering(vec![SubmitOutcome::Failure {
        message: "Upload rejected".to_string(),
    }]);
    let mut view = FakeView::default();
    let artifact = package(&[b"RIFF".to_vec()], &EncodingFormat::new("audio/wav"), "visit");

    let outcome = resubmit(&sink, &mut view, &FormFields::new(), &artifact).await;

    assert!(!outcome.is_success());
    assert!(view.has_status("Upload rejected", StatusKind::Error));
    assert!(view.log.lock().unwrap().navigated.is_empty());
}
