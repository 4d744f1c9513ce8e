//! Background rotator
//!
//! Crossfades between a cyclic set of background assets, one per question.
//! A transition fades the current background out, swaps the asset, waits
//! until it can play, fades back in and then holds for a settle delay so the
//! new scene is visible before any content animates over it.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The visual surface that shows the background
#[async_trait]
pub trait BackgroundSurface: Send + Sync {
    async fn fade_out(&self, duration: Duration);

    /// Replace the underlying asset
    async fn swap(&self, asset: &str);

    /// Resolve once the swapped asset is loaded and playing
    async fn wait_playable(&self);

    async fn fade_in(&self, duration: Duration);
}

/// What `begin_transition` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStart {
    /// The asset is already showing; the completion ran immediately
    AlreadyCurrent,
    /// A fade to the asset was already running; its completion now goes to
    /// the new caller
    Joined { asset_index: usize },
    /// A fade started. Content should be hidden until completion.
    Fading { asset_index: usize },
}

type Completion = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CompletionSlot {
    completion: Option<Completion>,
    finished: bool,
}

struct PendingTransition {
    asset_index: usize,
    slot: Arc<Mutex<CompletionSlot>>,
    task: JoinHandle<()>,
}

pub struct BackgroundRotator {
    assets: Vec<String>,
    surface: Arc<dyn BackgroundSurface>,
    fade_duration: Duration,
    settle_delay: Duration,

    /// Asset index currently shown (or being faded to)
    current: Option<usize>,

    pending: Option<PendingTransition>,
}

impl BackgroundRotator {
    pub fn new(
        assets: Vec<String>,
        surface: Arc<dyn BackgroundSurface>,
        fade_duration: Duration,
        settle_delay: Duration,
    ) -> Self {
        if assets.is_empty() {
            tracing::warn!("Background rotator has no assets; transitions complete immediately");
        }
        Self {
            assets,
            surface,
            fade_duration,
            settle_delay,
            current: None,
            pending: None,
        }
    }

    /// Mark `asset_index` as already showing (e.g. the page opened with it)
    pub fn with_initial(mut self, asset_index: usize) -> Self {
        if !self.assets.is_empty() {
            self.current = Some(asset_index % self.assets.len());
        }
        self
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn asset_index_for(&self, question_index: usize) -> Option<usize> {
        (!self.assets.is_empty()).then(|| question_index % self.assets.len())
    }

    pub fn current_asset(&self) -> Option<&str> {
        self.current.map(|i| self.assets[i].as_str())
    }

    pub fn is_transitioning(&self) -> bool {
        self.pending
            .as_ref()
            .map(|p| !p.slot.lock().finished)
            .unwrap_or(false)
    }

    /// Transition to the background for `question_index`
    ///
    /// `on_complete` runs once the new background is settled, or right away
    /// if it is already showing. A later call supersedes this one: an
    /// aborted transition never runs its completion.
    pub fn begin_transition<F>(&mut self, question_index: usize, on_complete: F) -> TransitionStart
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(asset_index) = self.asset_index_for(question_index) else {
            on_complete();
            return TransitionStart::AlreadyCurrent;
        };

        if let Some(pending) = &self.pending {
            let mut slot = pending.slot.lock();
            if !slot.finished && pending.asset_index == asset_index {
                slot.completion = Some(Box::new(on_complete));
                tracing::debug!("Joined running transition to background {}", asset_index);
                return TransitionStart::Joined { asset_index };
            }
        }
        self.abort_pending();

        if self.current == Some(asset_index) {
            tracing::debug!("Background {} already showing", asset_index);
            on_complete();
            return TransitionStart::AlreadyCurrent;
        }

        tracing::debug!(
            "Transitioning background to {} ({})",
            asset_index,
            self.assets[asset_index]
        );

        let slot = Arc::new(Mutex::new(CompletionSlot {
            completion: Some(Box::new(on_complete)),
            finished: false,
        }));

        let task = {
            let slot = slot.clone();
            let surface = self.surface.clone();
            let asset = self.assets[asset_index].clone();
            let fade = self.fade_duration;
            let settle = self.settle_delay;

            tokio::spawn(async move {
                surface.fade_out(fade).await;
                surface.swap(&asset).await;
                surface.wait_playable().await;
                surface.fade_in(fade).await;
                tokio::time::sleep(settle).await;

                let completion = {
                    let mut slot = slot.lock();
                    slot.finished = true;
                    slot.completion.take()
                };
                if let Some(completion) = completion {
                    completion();
                }
            })
        };

        self.current = Some(asset_index);
        self.pending = Some(PendingTransition {
            asset_index,
            slot,
            task,
        });

        TransitionStart::Fading { asset_index }
    }

    /// Abort any running transition without starting another
    pub fn cancel(&mut self) {
        self.abort_pending();
    }

    fn abort_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let finished = {
            let mut slot = pending.slot.lock();
            slot.completion = None;
            slot.finished
        };
        pending.task.abort();

        if !finished {
            // The surface stopped mid-fade; the next request must fade again
            self.current = None;
            tracing::debug!("Aborted transition to background {}", pending.asset_index);
        }
    }
}

impl Drop for BackgroundRotator {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

/// Headless surface that logs each step and sleeps for the fade durations
#[derive(Debug, Default)]
pub struct LoggingSurface;

#[async_trait]
impl BackgroundSurface for LoggingSurface {
    async fn fade_out(&self, duration: Duration) {
        tracing::debug!("Background fade out ({:?})", duration);
        tokio::time::sleep(duration).await;
    }

    async fn swap(&self, asset: &str) {
        tracing::info!("Background -> {}", asset);
    }

    async fn wait_playable(&self) {}

    async fn fade_in(&self, duration: Duration) {
        tracing::debug!("Background fade in ({:?})", duration);
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Surface that records every step it performs
    #[derive(Default)]
    struct RecordingSurface {
        steps: Mutex<Vec<String>>,
    }

    impl RecordingSurface {
        fn fade_outs(&self) -> usize {
            self.steps.lock().iter().filter(|s| *s == "fade_out").count()
        }
    }

    #[async_trait]
    impl BackgroundSurface for RecordingSurface {
        async fn fade_out(&self, duration: Duration) {
            self.steps.lock().push("fade_out".to_string());
            tokio::time::sleep(duration).await;
        }

        async fn swap(&self, asset: &str) {
            self.steps.lock().push(format!("swap:{asset}"));
        }

        async fn wait_playable(&self) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        async fn fade_in(&self, duration: Duration) {
            self.steps.lock().push("fade_in".to_string());
            tokio::time::sleep(duration).await;
        }
    }

    fn rotator(surface: Arc<RecordingSurface>) -> BackgroundRotator {
        BackgroundRotator::new(
            vec!["a.mp4".into(), "b.mp4".into(), "c.mp4".into()],
            surface,
            Duration::from_millis(300),
            Duration::from_millis(500),
        )
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let make = {
            let count = count.clone();
            move || {
                let count = count.clone();
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (count, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_runs_full_sequence() {
        let surface = Arc::new(RecordingSurface::default());
        let mut rotator = rotator(surface.clone());
        let (done, completion) = counter();

        let start = tokio::time::Instant::now();
        assert_eq!(
            rotator.begin_transition(4, completion()),
            TransitionStart::Fading { asset_index: 1 }
        );
        assert!(rotator.is_transitioning());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0, "settle delay not yet elapsed");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_millis(1150));
        assert_eq!(
            *surface.steps.lock(),
            vec!["fade_out", "swap:b.mp4", "fade_in"]
        );
        assert_eq!(rotator.current_asset(), Some("b.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_asset_is_idempotent() {
        let surface = Arc::new(RecordingSurface::default());
        let mut rotator = rotator(surface.clone());
        let (done, completion) = counter();

        rotator.begin_transition(0, completion());
        assert_eq!(
            rotator.begin_transition(0, completion()),
            TransitionStart::Joined { asset_index: 0 }
        );
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Index 3 wraps around to the same asset
        assert_eq!(
            rotator.begin_transition(3, completion()),
            TransitionStart::AlreadyCurrent
        );

        assert_eq!(surface.fade_outs(), 1);
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_transition_never_completes() {
        let surface = Arc::new(RecordingSurface::default());
        let mut rotator = rotator(surface.clone());
        let (first, first_completion) = counter();
        let (second, second_completion) = counter();

        rotator.begin_transition(0, first_completion());
        tokio::time::sleep(Duration::from_millis(100)).await;
        rotator.begin_transition(1, second_completion());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(rotator.current_asset(), Some("b.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_forgets_unfinished_asset() {
        let surface = Arc::new(RecordingSurface::default());
        let mut rotator = rotator(surface.clone());
        let (done, completion) = counter();

        rotator.begin_transition(2, completion());
        rotator.cancel();
        assert!(!rotator.is_transitioning());
        assert_eq!(rotator.current_asset(), None);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0);

        // Requesting the same asset again fades again
        assert!(matches!(
            rotator.begin_transition(2, completion()),
            TransitionStart::Fading { .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_asset_set_completes_immediately() {
        let mut rotator = BackgroundRotator::new(
            vec![],
            Arc::new(LoggingSurface),
            Duration::ZERO,
            Duration::ZERO,
        );
        let (done, completion) = counter();
        assert_eq!(
            rotator.begin_transition(7, completion()),
            TransitionStart::AlreadyCurrent
        );
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
