//! Playback orchestrator
//!
//! Sequences the quiz: background transition, countdown, answer, reveal,
//! next question, and drives the recording across the whole run.
//!
//! The orchestrator is a single task that owns all playback state. Commands
//! from [`PlayerHandle`]s and events from timers, transitions and the capture
//! backend are handled one at a time. Every event carries the session token
//! it was created under and is dropped if that session is gone or has moved
//! on.
//!
//! Capture starts and stops run as a chain of tasks, each waiting for the one
//! before it, so a new session's recording never races the previous
//! session's stop.

use super::countdown::CountdownId;
use super::session::{PlaybackSession, RecordingSlot};
use super::state::{
    OptionView, PlaybackPhase, PlaybackSnapshot, QuestionOutcome, QuestionView, Reveal,
    SessionToken, TimerUrgency, Verdict,
};
use crate::background::{BackgroundRotator, BackgroundSurface};
use crate::capture::{CaptureAdapter, CaptureError, RecordingArtifact, RecordingHandle};
use crate::config::PlaybackConfig;
use crate::quiz::Quiz;
use crate::utils::error::{PlayerError, PlayerResult};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Requests from the UI
enum Command {
    Start(oneshot::Sender<PlayerResult<SessionToken>>),
    Restart {
        keep_recording: bool,
        reply: oneshot::Sender<()>,
    },
    Select {
        option: usize,
        reply: oneshot::Sender<bool>,
    },
    ReplaceQuiz {
        quiz: Quiz,
        reply: oneshot::Sender<PlayerResult<()>>,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Deferred results posted back to the orchestrator
#[derive(Debug)]
enum Event {
    TransitionDone {
        token: SessionToken,
        index: usize,
    },
    TimerTick {
        token: SessionToken,
        countdown: CountdownId,
        remaining: u32,
    },
    TimerTimeout {
        token: SessionToken,
        countdown: CountdownId,
    },
    RevealElapsed {
        token: SessionToken,
        index: usize,
    },
    /// The capture task waits on `keep`; `false` (or no answer) stops the
    /// recording before the next capture operation runs
    CaptureStarted {
        token: SessionToken,
        result: Result<RecordingHandle, CaptureError>,
        keep: oneshot::Sender<bool>,
    },
    CaptureStopped {
        token: SessionToken,
        artifact: Option<RecordingArtifact>,
    },
}

/// The playback state machine
pub struct Orchestrator {
    quiz: Quiz,
    config: PlaybackConfig,
    rotator: BackgroundRotator,
    capture: CaptureAdapter,

    /// `None` while idle
    session: Option<PlaybackSession>,

    /// Last minted session token
    generation: u64,

    /// Session whose recording was kept across a restart
    salvage: Option<SessionToken>,

    /// Artifact kept across a restart, shown while idle
    retained_artifact: Option<RecordingArtifact>,

    /// Last capture operation; the next one waits for it
    capture_tail: Option<JoinHandle<()>>,

    event_tx: mpsc::UnboundedSender<Event>,
    event_rx: Option<mpsc::UnboundedReceiver<Event>>,

    snapshot: Arc<RwLock<PlaybackSnapshot>>,
    update_tx: broadcast::Sender<PlaybackSnapshot>,
}

impl Orchestrator {
    /// Create an idle orchestrator
    pub fn new(
        quiz: Quiz,
        config: PlaybackConfig,
        surface: Arc<dyn BackgroundSurface>,
        capture: CaptureAdapter,
    ) -> Self {
        let rotator = BackgroundRotator::new(
            config.backgrounds.clone(),
            surface,
            config.fade_duration(),
            config.settle_delay(),
        );
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (update_tx, _) = broadcast::channel(256);

        Self {
            quiz,
            config,
            rotator,
            capture,
            session: None,
            generation: 0,
            salvage: None,
            retained_artifact: None,
            capture_tail: None,
            event_tx,
            event_rx: Some(event_rx),
            snapshot: Arc::new(RwLock::new(PlaybackSnapshot::default())),
            update_tx,
        }
    }

    /// The background at `asset_index` is already on screen
    pub fn with_initial_background(mut self, asset_index: usize) -> Self {
        self.rotator = self.rotator.with_initial(asset_index);
        self
    }

    /// Run the orchestrator on the current tokio runtime
    pub fn spawn(self) -> PlayerHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        self.publish();

        let handle = PlayerHandle {
            command_tx,
            snapshot: self.snapshot.clone(),
            updates: self.update_tx.subscribe(),
        };

        tokio::spawn(self.run(command_rx));
        handle
    }

    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<Command>) {
        let Some(mut event_rx) = self.event_rx.take() else {
            return;
        };

        tracing::info!("Player ready with {} questions", self.quiz.len());

        loop {
            tokio::select! {
                biased;
                Some(event) = event_rx.recv() => self.handle_event(event),
                command = command_rx.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.teardown(false);
                        break;
                    }
                },
            }
        }

        tracing::info!("Player stopped");
    }

    /// Returns false once the player should stop
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start());
            }
            Command::Restart {
                keep_recording,
                reply,
            } => {
                self.teardown(keep_recording);
                self.publish();
                let _ = reply.send(());
            }
            Command::Select { option, reply } => {
                let _ = reply.send(self.select(option));
            }
            Command::ReplaceQuiz { quiz, reply } => {
                let _ = reply.send(self.replace_quiz(quiz));
            }
            Command::Shutdown(reply) => {
                self.teardown(false);
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::TransitionDone { token, index } => self.on_transition_done(token, index),
            Event::TimerTick {
                token,
                countdown,
                remaining,
            } => self.on_tick(token, countdown, remaining),
            Event::TimerTimeout { token, countdown } => self.on_timeout(token, countdown),
            Event::RevealElapsed { token, index } => self.on_reveal_elapsed(token, index),
            Event::CaptureStarted {
                token,
                result,
                keep,
            } => self.on_capture_started(token, result, keep),
            Event::CaptureStopped { token, artifact } => self.on_capture_stopped(token, artifact),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn start(&mut self) -> PlayerResult<SessionToken> {
        if self.session.is_some() {
            return Err(PlayerError::AlreadyStarted);
        }
        if !self.quiz.is_playable() {
            tracing::warn!("Cannot start playback: the quiz has no questions");
            return Err(PlayerError::EmptyQuiz);
        }

        self.generation += 1;
        let token = SessionToken(self.generation);
        self.salvage = None;
        self.retained_artifact = None;

        let mut session = PlaybackSession::new(token, self.config.countdown_secs);
        session.recording = RecordingSlot::Starting;
        self.session = Some(session);

        tracing::info!(
            "Starting playback session {:?} ({} questions)",
            token,
            self.quiz.len()
        );

        self.start_recording(token);
        self.enter_transition(0);
        Ok(token)
    }

    fn select(&mut self, option: usize) -> bool {
        let Some(session) = self.session.as_ref() else {
            tracing::debug!("Ignoring selection of option {} while idle", option);
            return false;
        };
        if session.phase != PlaybackPhase::AwaitingAnswer {
            tracing::debug!(
                "Ignoring selection of option {} during {:?}",
                option,
                session.phase
            );
            return false;
        }

        let count = self
            .quiz
            .question(session.current_index)
            .map(|q| q.option_count())
            .unwrap_or(0);
        if option == 0 || option > count {
            tracing::warn!("Ignoring selection of option {} (question has {})", option, count);
            return false;
        }

        self.resolve(Some(option));
        true
    }

    fn replace_quiz(&mut self, quiz: Quiz) -> PlayerResult<()> {
        if self.session.is_some() {
            return Err(PlayerError::NotIdle);
        }
        tracing::info!("Quiz replaced ({} questions)", quiz.len());
        self.quiz = quiz;
        self.publish();
        Ok(())
    }

    /// Discard the current session
    ///
    /// Cancels the countdown and any pending transition or reveal, and stops
    /// the recording. Its artifact is dropped unless `keep_recording`.
    fn teardown(&mut self, keep_recording: bool) {
        self.rotator.cancel();

        let Some(mut session) = self.session.take() else {
            if !keep_recording {
                self.retained_artifact = None;
            }
            return;
        };

        let token = session.token;

        if let Some(handle) = session.recording.begin_stop() {
            if keep_recording {
                self.salvage = Some(token);
            }
            self.stop_recording(token, handle);
        } else if keep_recording
            && matches!(
                session.recording,
                RecordingSlot::Starting | RecordingSlot::Stopping
            )
        {
            self.salvage = Some(token);
        }

        self.retained_artifact = if keep_recording {
            session.artifact.take()
        } else {
            None
        };

        tracing::info!("Playback session {:?} discarded", token);
    }

    // =========================================================================
    // Phase transitions
    // =========================================================================

    fn enter_transition(&mut self, index: usize) {
        let countdown_secs = self.config.countdown_secs;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.phase = PlaybackPhase::Transitioning;
        session.current_index = index;
        session.selected_answer = None;
        session.reveal = None;
        session.time_remaining = countdown_secs;
        let token = session.token;

        let tx = self.event_tx.clone();
        let start = self.rotator.begin_transition(index, move || {
            let _ = tx.send(Event::TransitionDone { token, index });
        });
        tracing::debug!("Question {}: background {:?}", index + 1, start);

        self.publish();
    }

    fn on_transition_done(&mut self, token: SessionToken, index: usize) {
        let countdown_secs = self.config.countdown_secs;
        let tx = self.event_tx.clone();
        let Some(session) = self.current_session(token) else {
            tracing::debug!("Dropping stale transition for session {:?}", token);
            return;
        };
        if session.phase != PlaybackPhase::Transitioning || session.current_index != index {
            tracing::debug!("Dropping transition for question {} in {:?}", index + 1, session.phase);
            return;
        }

        session.phase = PlaybackPhase::AwaitingAnswer;
        session.selected_answer = None;
        session.time_remaining = countdown_secs;

        let tick_tx = tx.clone();
        session.countdown.start(
            countdown_secs,
            move |countdown, remaining| {
                let _ = tick_tx.send(Event::TimerTick {
                    token,
                    countdown,
                    remaining,
                });
            },
            move |countdown| {
                let _ = tx.send(Event::TimerTimeout { token, countdown });
            },
        );

        tracing::info!("Question {} shown", index + 1);
        self.publish();
    }

    fn on_tick(&mut self, token: SessionToken, countdown: CountdownId, remaining: u32) {
        let Some(session) = self.answering_session(token, countdown) else {
            return;
        };
        session.time_remaining = remaining;
        self.publish();
    }

    fn on_timeout(&mut self, token: SessionToken, countdown: CountdownId) {
        let Some(session) = self.answering_session(token, countdown) else {
            return;
        };
        session.time_remaining = 0;
        tracing::info!("Question {} timed out", session.current_index + 1);
        self.resolve(None);
    }

    /// Lock in the answer and show the result
    fn resolve(&mut self, selected: Option<usize>) {
        let reveal_delay = self.config.reveal_delay();
        let tx = self.event_tx.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.countdown.cancel();

        let index = session.current_index;
        let Some(question) = self.quiz.question(index) else {
            return;
        };

        let reveal = Reveal::evaluate(question, selected);
        tracing::info!("Question {}: {}", index + 1, reveal.text);

        session.results.push(QuestionOutcome {
            question_id: question.id.clone(),
            selected,
            verdict: reveal.verdict,
        });
        session.phase = PlaybackPhase::Revealing;
        session.selected_answer = selected;
        session.reveal = Some(reveal);

        let token = session.token;
        session.schedule(reveal_delay, move || {
            let _ = tx.send(Event::RevealElapsed { token, index });
        });

        self.publish();
    }

    fn on_reveal_elapsed(&mut self, token: SessionToken, index: usize) {
        let Some(session) = self.current_session(token) else {
            tracing::debug!("Dropping stale reveal for session {:?}", token);
            return;
        };
        if session.phase != PlaybackPhase::Revealing || session.current_index != index {
            return;
        }

        if index + 1 < self.quiz.len() {
            self.enter_transition(index + 1);
        } else {
            self.complete();
        }
    }

    fn complete(&mut self) {
        let total = self.quiz.len();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.phase = PlaybackPhase::Completed;
        session.current_index = total;
        session.time_remaining = 0;
        session.countdown.cancel();

        let token = session.token;
        let correct = session
            .results
            .iter()
            .filter(|r| r.verdict == Verdict::Correct)
            .count();
        tracing::info!(
            "Playback complete: {}/{} answered correctly",
            correct,
            session.results.len()
        );

        if let Some(handle) = session.recording.begin_stop() {
            self.stop_recording(token, handle);
        }

        self.publish();
    }

    // =========================================================================
    // Recording
    // =========================================================================

    fn start_recording(&mut self, token: SessionToken) {
        let capture = self.capture.clone();
        let tx = self.event_tx.clone();
        self.chain_capture(async move {
            let result = capture.start().await;
            let handle = result.as_ref().ok().cloned();

            let (keep_tx, keep_rx) = oneshot::channel();
            let _ = tx.send(Event::CaptureStarted {
                token,
                result,
                keep: keep_tx,
            });

            let Some(handle) = handle else {
                return;
            };
            if !keep_rx.await.unwrap_or(false) {
                let artifact = capture.stop(&handle).await;
                let _ = tx.send(Event::CaptureStopped { token, artifact });
            }
        });
    }

    fn on_capture_started(
        &mut self,
        token: SessionToken,
        result: Result<RecordingHandle, CaptureError>,
        keep: oneshot::Sender<bool>,
    ) {
        let Some(session) = self.current_session(token) else {
            if result.is_ok() {
                tracing::debug!("Stopping recording started for discarded session {:?}", token);
            } else if self.salvage == Some(token) {
                self.salvage = None;
            }
            let _ = keep.send(false);
            return;
        };

        match result {
            Ok(_) if session.phase == PlaybackPhase::Completed => {
                session.recording = RecordingSlot::Stopping;
                let _ = keep.send(false);
            }
            Ok(handle) => {
                tracing::info!("Recording session {:?}", token);
                session.recording = RecordingSlot::Active(handle);
                let _ = keep.send(true);
            }
            Err(e) => {
                tracing::warn!("Playing without a recording: {}", e);
                session.recording = RecordingSlot::Unavailable(e.to_string());
            }
        }

        self.publish();
    }

    fn stop_recording(&mut self, token: SessionToken, handle: RecordingHandle) {
        let capture = self.capture.clone();
        let tx = self.event_tx.clone();
        self.chain_capture(async move {
            let artifact = capture.stop(&handle).await;
            let _ = tx.send(Event::CaptureStopped { token, artifact });
        });
    }

    /// Run `operation` once every earlier capture operation has finished
    fn chain_capture<F>(&mut self, operation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let previous = self.capture_tail.take();
        self.capture_tail = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            operation.await;
        }));
    }

    fn on_capture_stopped(&mut self, token: SessionToken, artifact: Option<RecordingArtifact>) {
        if let Some(session) = self.current_session(token) {
            session.recording = RecordingSlot::Finished;
            session.artifact = artifact;
        } else if self.salvage == Some(token) {
            self.salvage = None;
            self.retained_artifact = artifact;
        } else {
            tracing::debug!("Discarding recording of session {:?}", token);
            return;
        }
        self.publish();
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn current_session(&mut self, token: SessionToken) -> Option<&mut PlaybackSession> {
        self.session.as_mut().filter(|s| s.token == token)
    }

    /// The session, if it is waiting for an answer on `countdown`
    fn answering_session(
        &mut self,
        token: SessionToken,
        countdown: CountdownId,
    ) -> Option<&mut PlaybackSession> {
        self.current_session(token).filter(|s| {
            s.phase == PlaybackPhase::AwaitingAnswer && s.countdown.is_current(countdown)
        })
    }

    fn build_snapshot(&self) -> PlaybackSnapshot {
        let countdown_secs = self.config.countdown_secs.max(1);

        let Some(session) = &self.session else {
            return PlaybackSnapshot {
                total_questions: self.quiz.len(),
                time_remaining: self.config.countdown_secs,
                timer_fraction: 1.0,
                recording_artifact: self.retained_artifact.clone(),
                ..Default::default()
            };
        };

        let question = self.quiz.question(session.current_index);
        let marks = session.reveal.as_ref().map(|r| r.marks.as_slice());
        let timer_urgency = if session.phase == PlaybackPhase::AwaitingAnswer {
            TimerUrgency::for_remaining(session.time_remaining, &self.config)
        } else {
            TimerUrgency::Normal
        };

        PlaybackSnapshot {
            session: Some(session.token),
            phase: session.phase,
            current_index: session.current_index,
            total_questions: self.quiz.len(),
            content_visible: session.phase.content_visible(),
            question: question.map(|q| QuestionView {
                id: q.id.clone(),
                text: q.text.clone(),
                answer_format: q.answer_format,
                prediction: q.is_prediction(),
            }),
            options: question
                .map(|q| OptionView::for_question(q, marks, self.config.option_stagger_ms))
                .unwrap_or_default(),
            selected_answer: session.selected_answer,
            time_remaining: session.time_remaining,
            timer_fraction: session.time_remaining as f32 / countdown_secs as f32,
            timer_urgency,
            timer_running: session.countdown.is_running(),
            reveal: session.reveal.clone(),
            recording: session.recording.status(),
            recording_unavailable: matches!(session.recording, RecordingSlot::Unavailable(_)),
            recording_artifact: session.artifact.clone(),
            results: session.results.clone(),
        }
    }

    fn publish(&self) {
        let snapshot = self.build_snapshot();
        *self.snapshot.write() = snapshot.clone();
        let _ = self.update_tx.send(snapshot);
    }
}

/// Cloneable handle the UI uses to drive playback
pub struct PlayerHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot: Arc<RwLock<PlaybackSnapshot>>,
    updates: broadcast::Receiver<PlaybackSnapshot>,
}

impl Clone for PlayerHandle {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            snapshot: self.snapshot.clone(),
            updates: self.updates.resubscribe(),
        }
    }
}

impl PlayerHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> PlayerResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .map_err(|_| PlayerError::Closed)?;
        reply_rx.await.map_err(|_| PlayerError::Closed)
    }

    /// Start a new session (requires idle and a non-empty quiz)
    pub async fn start(&self) -> PlayerResult<SessionToken> {
        self.request(Command::Start).await?
    }

    /// Discard the session and its recording, back to idle
    pub async fn restart(&self) -> PlayerResult<()> {
        self.request(|reply| Command::Restart {
            keep_recording: false,
            reply,
        })
        .await
    }

    /// Back to idle, keeping the recording made so far
    pub async fn restart_keeping_recording(&self) -> PlayerResult<()> {
        self.request(|reply| Command::Restart {
            keep_recording: true,
            reply,
        })
        .await
    }

    /// Choose option `option` (1-based). Returns whether it locked the answer.
    pub async fn select_option(&self, option: usize) -> PlayerResult<bool> {
        self.request(|reply| Command::Select { option, reply }).await
    }

    /// Hand a new quiz to an idle player
    pub async fn replace_quiz(&self, quiz: Quiz) -> PlayerResult<()> {
        self.request(|reply| Command::ReplaceQuiz { quiz, reply })
            .await?
    }

    /// Tear down the session and stop the player
    pub async fn shutdown(&self) -> PlayerResult<()> {
        self.request(Command::Shutdown).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.read().clone()
    }

    /// Every snapshot published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackSnapshot> {
        self.updates.resubscribe()
    }

    /// Wait until a published snapshot satisfies `condition`
    pub async fn wait_until<F>(&self, condition: F) -> PlayerResult<PlaybackSnapshot>
    where
        F: Fn(&PlaybackSnapshot) -> bool,
    {
        let mut updates = self.subscribe();
        let current = self.snapshot();
        if condition(&current) {
            return Ok(current);
        }

        loop {
            match updates.recv().await {
                Ok(snapshot) if condition(&snapshot) => return Ok(snapshot),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Snapshot stream lagged by {}", skipped);
                    let current = self.snapshot();
                    if condition(&current) {
                        return Ok(current);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(PlayerError::Closed),
            }
        }
    }
}
