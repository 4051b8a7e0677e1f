//! Recording session tests against the scripted capture backend

use std::sync::Arc;
use std::time::Duration;

use recform::application::ports::EncoderEvent;
use recform::application::{RecordingSession, SessionError, SessionOptions};
use recform::domain::artifact::FileNaming;
use recform::domain::capture::CaptureConfig;
use recform::domain::error::CaptureError;
use recform::domain::session::SessionState;
use recform::infrastructure::ScriptedBackend;

fn session(backend: ScriptedBackend) -> RecordingSession<ScriptedBackend> {
    RecordingSession::new(Arc::new(backend), SessionOptions::default())
}

fn capture_error(result: Result<(), SessionError>) -> CaptureError {
    match result {
        Err(SessionError::Capture(e)) => e,
        other => panic!("expected capture error, got {:?}", other),
    }
}

#[tokio::test]
async fn artifact_is_chunks_in_order() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);

    session.start(&CaptureConfig::microphone()).await.unwrap();
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.format().as_str(), "audio/webm;codecs=opus");

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Finished);

    let artifact = session.artifact().unwrap();
    assert_eq!(artifact.bytes(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(artifact.extension(), "webm");
    assert!(artifact.suggested_file_name().starts_with("gravacao-"));
    assert!(artifact.suggested_file_name().ends_with(".webm"));
    assert!(probe.all_released());
    assert!(!session.holds_resources());
}

#[tokio::test]
async fn chunks_flushed_at_stop_are_kept() {
    let backend = ScriptedBackend::new()
        .with_chunks(vec![vec![1]])
        .with_final_chunk(vec![9, 9]);
    let mut session = session(backend);

    session.start(&CaptureConfig::microphone()).await.unwrap();
    session.stop().await.unwrap();

    assert_eq!(session.artifact().unwrap().bytes(), &[1, 9, 9]);
}

#[tokio::test]
async fn empty_chunks_are_dropped() {
    let backend = ScriptedBackend::new().with_chunks(vec![vec![], vec![7], vec![]]);
    let mut session = session(backend);

    session.start(&CaptureConfig::microphone()).await.unwrap();
    session.stop().await.unwrap();

    assert_eq!(session.artifact().unwrap().bytes(), &[7]);
}

#[tokio::test]
async fn recording_without_data_finishes_empty() {
    let backend = ScriptedBackend::new().with_chunks(Vec::new());
    let mut session = session(backend);

    session.start(&CaptureConfig::microphone()).await.unwrap();
    session.stop().await.unwrap();

    assert_eq!(session.state(), SessionState::Finished);
    let artifact = session.artifact().unwrap();
    assert!(artifact.is_empty());
    assert_eq!(artifact.size_bytes(), 0);
}

#[tokio::test]
async fn continuous_recording_is_one_chunk() {
    let backend = ScriptedBackend::new();
    let mut session = RecordingSession::new(
        Arc::new(backend),
        SessionOptions {
            timeslice: None,
            ..SessionOptions::default()
        },
    );

    session.start(&CaptureConfig::microphone()).await.unwrap();
    session.stop().await.unwrap();

    assert_eq!(session.artifact().unwrap().bytes(), &[1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn context_name_shapes_file_name() {
    let backend = ScriptedBackend::new().with_supported_formats(vec!["audio/wav"]);
    let mut session = RecordingSession::new(
        Arc::new(backend),
        SessionOptions {
            naming: FileNaming::from_context(Some("Maria/Silva")),
            ..SessionOptions::default()
        },
    );

    session.start(&CaptureConfig::microphone()).await.unwrap();
    session.stop().await.unwrap();

    let name = session.artifact().unwrap().suggested_file_name().to_string();
    assert!(name.starts_with("Maria-Silva - "), "{}", name);
    assert!(name.ends_with(".wav"));
}

#[tokio::test]
async fn microphone_and_system_audio_are_mixed() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);

    session
        .start(&CaptureConfig::microphone_and_system())
        .await
        .unwrap();

    assert_eq!(probe.streams_opened(), 2);
    assert_eq!(probe.mixes(), 1);
    // The display's video track is dropped straight away.
    assert_eq!(session.discarded_video_tracks(), 1);

    session.stop().await.unwrap();
    assert!(probe.all_released());
}

#[tokio::test]
async fn system_audio_alone_is_not_mixed() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);

    let config = CaptureConfig {
        include_microphone: false,
        include_system_audio: true,
        device_id: None,
    };
    session.start(&config).await.unwrap();

    assert_eq!(probe.streams_opened(), 1);
    assert_eq!(probe.mixes(), 0);
}

#[tokio::test]
async fn display_without_audio_releases_microphone() {
    let backend = ScriptedBackend::new().without_display_audio();
    let probe = backend.probe();
    let mut session = session(backend);

    let err = capture_error(session.start(&CaptureConfig::microphone_and_system()).await);

    assert_eq!(err, CaptureError::NoSystemAudioTrack);
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(
        session.error_message(),
        Some(CaptureError::NoSystemAudioTrack.to_string().as_str())
    );
    assert!(probe.all_released());
}

#[tokio::test]
async fn denied_display_releases_microphone() {
    let backend = ScriptedBackend::new().with_display_denied();
    let probe = backend.probe();
    let mut session = session(backend);

    let err = capture_error(session.start(&CaptureConfig::microphone_and_system()).await);

    assert_eq!(err, CaptureError::PermissionDenied);
    assert_eq!(probe.streams_opened(), 1);
    assert!(probe.all_released());
}

#[tokio::test]
async fn missing_device_is_not_replaced_by_default() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);

    let err = capture_error(
        session
            .start(&CaptureConfig::microphone().with_device("gone"))
            .await,
    );

    assert_eq!(err, CaptureError::DeviceUnavailable("gone".into()));
    assert_eq!(probe.streams_opened(), 0);
}

#[tokio::test]
async fn permission_denied_fails_session() {
    let mut session = session(ScriptedBackend::new().with_permission_denied());

    let err = capture_error(session.start(&CaptureConfig::microphone()).await);

    assert_eq!(err, CaptureError::PermissionDenied);
    assert_eq!(session.state(), SessionState::Error);
    assert!(!session.holds_resources());
}

#[tokio::test]
async fn no_source_is_refused_before_acquiring() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);

    let config = CaptureConfig {
        include_microphone: false,
        include_system_audio: false,
        device_id: None,
    };
    let err = capture_error(session.start(&config).await);

    assert_eq!(err, CaptureError::NoSourceSelected);
    assert_eq!(probe.streams_opened(), 0);
}

#[tokio::test]
async fn unsupported_format_is_refused_before_acquiring() {
    let backend = ScriptedBackend::new().with_supported_formats(Vec::<String>::new());
    let probe = backend.probe();
    let mut session = session(backend);

    let err = capture_error(session.start(&CaptureConfig::microphone()).await);

    assert_eq!(err, CaptureError::UnsupportedFormat);
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(probe.streams_opened(), 0);
}

#[tokio::test]
async fn encoder_failure_releases_streams() {
    let backend = ScriptedBackend::new().with_encoder_start_error("boom");
    let probe = backend.probe();
    let mut session = session(backend);

    let err = capture_error(session.start(&CaptureConfig::microphone_and_system()).await);

    assert_eq!(err, CaptureError::EncoderFailed("boom".into()));
    assert!(probe.all_released());
}

#[tokio::test]
async fn encoder_error_event_fails_recording() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);
    session.start(&CaptureConfig::microphone()).await.unwrap();

    let result = session.handle_event(Some(EncoderEvent::Error("disk full".into())));

    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::Error);
    assert!(probe.all_released());
}

#[tokio::test]
async fn confirmed_cancel_discards_and_releases() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);
    session.start(&CaptureConfig::microphone()).await.unwrap();

    assert!(!session.cancel(false).unwrap());
    assert_eq!(session.state(), SessionState::Recording);

    assert!(session.cancel(true).unwrap());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.artifact().is_none());
    assert_eq!(session.chunk_count(), 0);
    assert!(probe.all_released());
}

#[tokio::test]
async fn abandoned_start_releases_everything() {
    let backend = ScriptedBackend::new().with_pending_permission();
    let probe = backend.probe();
    let mut session = session(backend);

    {
        let config = CaptureConfig::microphone();
        let start = session.start(&config);
        let timed_out = tokio::time::timeout(Duration::from_millis(20), start).await;
        assert!(timed_out.is_err());
    }
    assert_eq!(session.state(), SessionState::AcquiringPermissions);

    session.abort_acquisition().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(probe.all_released());
}

#[tokio::test]
async fn reset_and_retry_return_to_idle() {
    let mut session = session(ScriptedBackend::new());
    session.start(&CaptureConfig::microphone()).await.unwrap();
    session.stop().await.unwrap();

    session.reset().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.artifact().is_none());

    let mut failed = self::session(ScriptedBackend::new().with_permission_denied());
    let _ = failed.start(&CaptureConfig::microphone()).await;
    failed.retry().unwrap();
    assert_eq!(failed.state(), SessionState::Idle);
    assert!(failed.error_message().is_none());
}

#[tokio::test]
async fn invalid_commands_are_rejected() {
    let mut session = session(ScriptedBackend::new());

    assert!(matches!(
        session.stop().await,
        Err(SessionError::InvalidState(_))
    ));
    assert!(session.reset().is_err());
    assert_eq!(session.state(), SessionState::Idle);

    session.start(&CaptureConfig::microphone()).await.unwrap();
    assert!(matches!(
        session.start(&CaptureConfig::microphone()).await,
        Err(SessionError::InvalidState(_))
    ));
    assert_eq!(session.state(), SessionState::Recording);
}

#[tokio::test]
async fn elapsed_time_counts_only_while_recording() {
    let mut session = session(ScriptedBackend::new());
    session.tick();
    assert_eq!(session.elapsed_seconds(), 0);

    session.start(&CaptureConfig::microphone()).await.unwrap();
    session.tick();
    session.tick();
    assert_eq!(session.elapsed_seconds(), 2);

    session.stop().await.unwrap();
    session.tick();
    assert_eq!(session.elapsed_seconds(), 2);
}

#[tokio::test]
async fn dropping_session_releases_devices() {
    let backend = ScriptedBackend::new();
    let probe = backend.probe();
    let mut session = session(backend);
    session.start(&CaptureConfig::microphone()).await.unwrap();
    assert!(!probe.all_released());

    drop(session);
    assert!(probe.all_released());
}
