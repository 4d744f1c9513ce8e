//! Quiz Recorder - timed, animated quiz playback with screen recording.
//!
//! This is the main library crate. It provides the playback orchestrator,
//! the background rotator and capture plumbing it drives, and a headless
//! runner used by the `quiz-recorder` binary.

pub mod background;
pub mod capture;
pub mod config;
pub mod player;
pub mod quiz;
pub mod utils;

pub use config::PlaybackConfig;
pub use player::{Orchestrator, PlaybackPhase, PlaybackSnapshot, PlayerHandle};
pub use utils::error::{ErrorResponse, PlayerError, PlayerResult};

use background::LoggingSurface;
use capture::{CaptureAdapter, FrameLogCapture};
use player::RecordingStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiz_recorder=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// One unattended playback
#[derive(Debug, Clone)]
pub struct HeadlessRun {
    pub quiz_path: PathBuf,
    pub config_path: Option<PathBuf>,
    /// Option to pick per question (1-based); missing entries time out
    pub answers: Vec<usize>,
    pub out_dir: PathBuf,
    pub fps: u32,
}

/// Play a quiz without a UI and save the recording
///
/// Returns where the artifact was written, or `None` if nothing was
/// recorded.
pub async fn run(options: HeadlessRun) -> PlayerResult<Option<PathBuf>> {
    tracing::info!("Starting Quiz Recorder v{}", env!("CARGO_PKG_VERSION"));

    let quiz = quiz::read_quiz(&options.quiz_path)?;
    let config = match &options.config_path {
        Some(path) => PlaybackConfig::load(path)?,
        None => PlaybackConfig::default(),
    };

    let capture = CaptureAdapter::new(Arc::new(FrameLogCapture::new(options.fps)));
    let player = Orchestrator::new(quiz, config, Arc::new(LoggingSurface), capture).spawn();

    player.start().await?;

    let total = player.snapshot().total_questions;
    for index in 0..total {
        let snapshot = player
            .wait_until(|s| {
                s.phase == PlaybackPhase::Completed
                    || s.current_index > index
                    || (s.phase == PlaybackPhase::AwaitingAnswer && s.current_index == index)
            })
            .await?;

        if snapshot.phase != PlaybackPhase::AwaitingAnswer || snapshot.current_index != index {
            continue;
        }
        if let Some(&answer) = options.answers.get(index) {
            if !player.select_option(answer).await? {
                tracing::warn!("Answer {} for question {} was not accepted", answer, index + 1);
            }
        }
    }

    let done = player
        .wait_until(|s| {
            s.phase == PlaybackPhase::Completed
                && !matches!(
                    s.recording,
                    RecordingStatus::Starting | RecordingStatus::Recording | RecordingStatus::Stopping
                )
        })
        .await?;
    player.shutdown().await?;

    let Some(artifact) = done.recording_artifact else {
        tracing::warn!("Playback finished without a recording");
        return Ok(None);
    };

    let path = artifact.save_to(&options.out_dir)?;
    tracing::info!("Recording saved to {:?}", path);

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(start_paused = true)]
    async fn test_headless_run_saves_frame_log() {
        let dir = tempdir().unwrap();
        let quiz_path = dir.path().join("quiz.json");
        std::fs::write(
            &quiz_path,
            r#"{
                "questions": [
                    {
                        "id": "q1",
                        "questionText": "Pick blue",
                        "answerFormat": "text",
                        "options": [{"text": "Red"}, {"text": "Blue"}, {"text": "Green"}, {"text": "Gold"}],
                        "correctAnswer": 2
                    },
                    {
                        "id": "q2",
                        "questionText": "Pick red",
                        "options": [{"text": "Red"}, {"text": "Blue"}, {"text": "Green"}, {"text": "Gold"}],
                        "correctAnswer": 1
                    }
                ]
            }"#,
        )
        .unwrap();

        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"countdownSecs": 2, "fadeDurationMs": 50, "settleDelayMs": 50, "backgrounds": ["a.mp4"]}"#,
        )
        .unwrap();

        let out_dir = dir.path().join("out");
        let saved = run(HeadlessRun {
            quiz_path,
            config_path: Some(config_path),
            answers: vec![2],
            out_dir: out_dir.clone(),
            fps: 10,
        })
        .await
        .unwrap()
        .expect("recording saved");

        assert!(saved.starts_with(&out_dir));
        assert_eq!(saved.extension().and_then(|e| e.to_str()), Some("csv"));
        let log = std::fs::read_to_string(&saved).unwrap();
        assert!(log.starts_with("frame,index,elapsed_ms\n"));
        assert!(log.lines().count() > 10);
    }

    #[tokio::test]
    async fn test_headless_run_reports_missing_quiz() {
        let dir = tempdir().unwrap();
        let result = run(HeadlessRun {
            quiz_path: dir.path().join("missing.json"),
            config_path: None,
            answers: Vec::new(),
            out_dir: dir.path().to_path_buf(),
            fps: 10,
        })
        .await;
        assert!(matches!(
            result,
            Err(PlayerError::Bundle(quiz::BundleError::MissingFile(_)))
        ));
    }

    #[tokio::test]
    async fn test_headless_run_reports_bad_config() {
        let dir = tempdir().unwrap();
        let quiz_path = dir.path().join("quiz.json");
        std::fs::write(&quiz_path, r#"{"questions": []}"#).unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"countdownSecs": 0}"#).unwrap();

        let error = run(HeadlessRun {
            quiz_path,
            config_path: Some(config_path),
            answers: Vec::new(),
            out_dir: dir.path().to_path_buf(),
            fps: 10,
        })
        .await
        .unwrap_err();

        let response = ErrorResponse::from(error);
        assert_eq!(response.code, "CONFIG_ERROR");
    }

    #[tokio::test(start_paused = true)]
    async fn test_headless_run_reports_unwritable_output() {
        let dir = tempdir().unwrap();
        let quiz_path = dir.path().join("quiz.json");
        std::fs::write(
            &quiz_path,
            r#"{"questions": [{"id": "q1", "questionText": "Pick one", "options": [{"text": "A"}, {"text": "B"}, {"text": "C"}, {"text": "D"}], "correctAnswer": 1}]}"#,
        )
        .unwrap();

        let error = run(HeadlessRun {
            quiz_path: quiz_path.clone(),
            config_path: None,
            answers: vec![1],
            // A file, not a directory
            out_dir: quiz_path,
            fps: 10,
        })
        .await
        .unwrap_err();

        assert!(matches!(error, PlayerError::Io(_)));
        assert_eq!(ErrorResponse::from(error).code, "IO_ERROR");
    }

    #[tokio::test]
    async fn test_headless_run_rejects_empty_quiz() {
        let dir = tempdir().unwrap();
        let quiz_path = dir.path().join("quiz.json");
        std::fs::write(&quiz_path, r#"{"questions": []}"#).unwrap();

        let result = run(HeadlessRun {
            quiz_path,
            config_path: None,
            answers: Vec::new(),
            out_dir: dir.path().to_path_buf(),
            fps: 10,
        })
        .await;
        assert!(matches!(result, Err(PlayerError::EmptyQuiz)));
    }
}
