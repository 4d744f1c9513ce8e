//! Playback session
//!
//! Everything that belongs to one run of the quiz. A session is created by
//! `start()` and dropped wholesale on restart; dropping it cancels its
//! countdown and any deferred step, so nothing it spawned can touch the next
//! session.

use super::countdown::Countdown;
use super::state::{PlaybackPhase, QuestionOutcome, RecordingStatus, Reveal, SessionToken};
use crate::capture::{RecordingArtifact, RecordingHandle};
use std::time::Duration;
use tokio::task::JoinHandle;

/// The session's recording
#[derive(Debug, Default)]
pub(crate) enum RecordingSlot {
    #[default]
    Inactive,
    /// Capture start requested, waiting for the backend
    Starting,
    Active(RecordingHandle),
    /// Stop requested, waiting for the artifact
    Stopping,
    Finished,
    Unavailable(String),
}

impl RecordingSlot {
    pub fn status(&self) -> RecordingStatus {
        match self {
            Self::Inactive => RecordingStatus::Inactive,
            Self::Starting => RecordingStatus::Starting,
            Self::Active(_) => RecordingStatus::Recording,
            Self::Stopping => RecordingStatus::Stopping,
            Self::Finished => RecordingStatus::Finished,
            Self::Unavailable(_) => RecordingStatus::Unavailable,
        }
    }

    /// Take the handle out of an active recording, leaving `Stopping`
    pub fn begin_stop(&mut self) -> Option<RecordingHandle> {
        match std::mem::take(self) {
            Self::Active(handle) => {
                *self = Self::Stopping;
                Some(handle)
            }
            other => {
                *self = other;
                None
            }
        }
    }
}

pub(crate) struct PlaybackSession {
    pub token: SessionToken,
    pub phase: PlaybackPhase,
    pub current_index: usize,
    pub selected_answer: Option<usize>,
    pub time_remaining: u32,
    pub reveal: Option<Reveal>,
    pub results: Vec<QuestionOutcome>,
    pub recording: RecordingSlot,
    pub artifact: Option<RecordingArtifact>,
    pub countdown: Countdown,

    /// Pending delayed step (the reveal hold)
    deferred: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    pub fn new(token: SessionToken, countdown_secs: u32) -> Self {
        Self {
            token,
            phase: PlaybackPhase::Idle,
            current_index: 0,
            selected_answer: None,
            time_remaining: countdown_secs,
            reveal: None,
            results: Vec::new(),
            recording: RecordingSlot::Inactive,
            artifact: None,
            countdown: Countdown::new(),
            deferred: None,
        }
    }

    /// Run `step` after `delay`, replacing any step still pending
    pub fn schedule<F>(&mut self, delay: Duration, step: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel_deferred();
        self.deferred = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            step();
        }));
    }

    pub fn cancel_deferred(&mut self) {
        if let Some(task) = self.deferred.take() {
            task.abort();
        }
    }
}

// The countdown cancels itself when dropped
impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.cancel_deferred();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_dropping_session_cancels_deferred_step() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut session = PlaybackSession::new(SessionToken(1), 10);
        {
            let fired = fired.clone();
            session.schedule(Duration::from_secs(2), move || fired.store(true, Ordering::SeqCst));
        }
        drop(session);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_session_stops_countdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut session = PlaybackSession::new(SessionToken(1), 10);
        {
            let ticks = ticks.clone();
            session.countdown.start(
                10,
                move |_, _| {
                    ticks.fetch_add(1, Ordering::SeqCst);
                },
                |_| {},
            );
        }

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        drop(session);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_begin_stop_only_takes_active_handle() {
        let mut slot = RecordingSlot::Starting;
        assert!(slot.begin_stop().is_none());
        assert_eq!(slot.status(), RecordingStatus::Starting);

        let handle = RecordingHandle::new();
        let mut slot = RecordingSlot::Active(handle.clone());
        assert_eq!(slot.begin_stop(), Some(handle));
        assert_eq!(slot.status(), RecordingStatus::Stopping);
    }
}
