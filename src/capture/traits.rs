//! Capture trait definitions
//!
//! Platform-agnostic interface to a screen recording backend. The player
//! never talks to a backend directly; it goes through
//! [`CaptureAdapter`](super::adapter::CaptureAdapter).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Screen capture unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Ownership token for one active recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingHandle {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RecordingHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RecordingHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished recording, ready to be downloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingArtifact {
    /// Id of the recording handle that produced this artifact
    pub recording_id: Uuid,

    /// MIME type, e.g. `video/webm;codecs=vp9`
    pub mime_type: String,

    /// When the recording was stopped
    pub created_at: DateTime<Utc>,

    /// Size of the payload in bytes
    pub size_bytes: usize,

    #[serde(skip)]
    data: Arc<Vec<u8>>,
}

impl RecordingArtifact {
    pub fn new(recording_id: Uuid, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            recording_id,
            mime_type: mime_type.into(),
            created_at: Utc::now(),
            size_bytes: data.len(),
            data: Arc::new(data),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// File extension derived from the MIME type
    pub fn extension(&self) -> &'static str {
        let essence = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        match essence {
            "video/webm" => "webm",
            "video/mp4" => "mp4",
            "text/csv" => "csv",
            _ => "bin",
        }
    }

    /// Suggested download name: `quiz-<unix millis>.<ext>`
    pub fn file_name(&self) -> String {
        format!(
            "quiz-{}.{}",
            self.created_at.timestamp_millis(),
            self.extension()
        )
    }

    /// Write the recording into `dir` and return the full path
    pub fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.data())?;
        tracing::info!("Saved recording ({} bytes) to {:?}", self.size_bytes, path);
        Ok(path)
    }
}

/// A screen recording backend
///
/// Implementations use interior mutability: the adapter shares one backend
/// between the tasks that start and stop recordings.
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Start recording. Fails with [`CaptureError::Unavailable`] or
    /// [`CaptureError::PermissionDenied`] when the environment cannot record.
    async fn start(&self) -> CaptureResult<RecordingHandle>;

    /// Stop the recording owned by `handle` and hand over what was captured
    async fn stop(&self, handle: &RecordingHandle) -> CaptureResult<Option<RecordingArtifact>>;
}

/// Backend for environments without screen capture
#[derive(Debug, Default)]
pub struct NoCapture;

#[async_trait]
impl CaptureService for NoCapture {
    fn name(&self) -> &str {
        "none"
    }

    async fn start(&self) -> CaptureResult<RecordingHandle> {
        Err(CaptureError::Unavailable(
            "no capture backend configured".to_string(),
        ))
    }

    async fn stop(&self, _handle: &RecordingHandle) -> CaptureResult<Option<RecordingArtifact>> {
        Ok(None)
    }
}
