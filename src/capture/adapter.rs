//! Capture service adapter
//!
//! Wraps a [`CaptureService`] so that recording failures never escape as
//! hard errors: the player keeps going without a recording.

use super::traits::{CaptureError, CaptureService, RecordingArtifact, RecordingHandle};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Notifications about the recording lifecycle
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A recording started
    Started(RecordingHandle),
    /// The backend could not record
    Unavailable(String),
    /// A finished recording is ready for download
    ArtifactAvailable(RecordingArtifact),
    /// A recording was stopped
    Stopped(Uuid),
}

/// Shared, cloneable front for one capture backend
#[derive(Clone)]
pub struct CaptureAdapter {
    service: Arc<dyn CaptureService>,

    /// Handles started through this adapter and not yet stopped
    active: Arc<Mutex<HashSet<Uuid>>>,

    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureAdapter {
    pub fn new(service: Arc<dyn CaptureService>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            service,
            active: Arc::new(Mutex::new(HashSet::new())),
            event_tx,
        }
    }

    /// Subscribe to recording notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Number of recordings currently running
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Start recording
    ///
    /// Every backend failure is reported as [`CaptureError::Unavailable`].
    pub async fn start(&self) -> Result<RecordingHandle, CaptureError> {
        tracing::info!("Starting capture via {}", self.service.name());

        match self.service.start().await {
            Ok(handle) => {
                self.active.lock().insert(handle.id);
                let _ = self.event_tx.send(CaptureEvent::Started(handle.clone()));
                tracing::info!("Capture started: {}", handle.id);
                Ok(handle)
            }
            Err(e) => {
                let reason = match e {
                    CaptureError::Unavailable(reason) => reason,
                    other => other.to_string(),
                };
                tracing::warn!("Capture unavailable, continuing without recording: {}", reason);
                let _ = self.event_tx.send(CaptureEvent::Unavailable(reason.clone()));
                Err(CaptureError::Unavailable(reason))
            }
        }
    }

    /// Stop a recording
    ///
    /// Stopping a handle that is already stopped (or was never started here)
    /// returns `None`.
    pub async fn stop(&self, handle: &RecordingHandle) -> Option<RecordingArtifact> {
        if !self.active.lock().remove(&handle.id) {
            tracing::debug!("Capture {} already stopped", handle.id);
            return None;
        }

        tracing::info!("Stopping capture {}", handle.id);

        let artifact = match self.service.stop(handle).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!("Failed to stop capture {}: {}", handle.id, e);
                None
            }
        };

        let _ = self.event_tx.send(CaptureEvent::Stopped(handle.id));
        if let Some(ref artifact) = artifact {
            tracing::info!("Recording available: {} bytes", artifact.size_bytes);
            let _ = self
                .event_tx
                .send(CaptureEvent::ArtifactAvailable(artifact.clone()));
        }

        artifact
    }
}
