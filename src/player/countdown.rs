//! Countdown timer
//!
//! A one-second ticking clock for the answer phase. At most one countdown is
//! running per [`Countdown`]: starting a new one cancels the previous.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Identifies one started countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountdownId(u64);

struct RunningCountdown {
    id: CountdownId,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

#[derive(Default)]
pub struct Countdown {
    next_id: u64,
    running: Option<RunningCountdown>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down from `seconds`
    ///
    /// Every second `on_tick` gets the new remaining value; when it reaches
    /// zero `on_timeout` runs once and the countdown stops by itself.
    pub fn start<T, F>(&mut self, seconds: u32, on_tick: T, on_timeout: F) -> CountdownId
    where
        T: Fn(CountdownId, u32) + Send + 'static,
        F: FnOnce(CountdownId) + Send + 'static,
    {
        self.cancel();

        self.next_id += 1;
        let id = CountdownId(self.next_id);
        let cancelled = Arc::new(AtomicBool::new(false));

        let task = {
            let cancelled = cancelled.clone();
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + TICK, TICK);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                let mut remaining = seconds;
                while remaining > 0 {
                    ticker.tick().await;
                    if cancelled.load(Ordering::SeqCst) {
                        return;
                    }
                    remaining -= 1;
                    on_tick(id, remaining);
                }

                if !cancelled.load(Ordering::SeqCst) {
                    on_timeout(id);
                }
            })
        };

        tracing::debug!("Countdown {:?} started at {}s", id, seconds);
        self.running = Some(RunningCountdown {
            id,
            cancelled,
            task,
        });
        id
    }

    /// Stop the running countdown. No callback fires for it afterwards.
    ///
    /// Returns whether a countdown was still ticking.
    pub fn cancel(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return false;
        };

        running.cancelled.store(true, Ordering::SeqCst);
        let was_ticking = !running.task.is_finished();
        running.task.abort();

        if was_ticking {
            tracing::debug!("Countdown {:?} cancelled", running.id);
        }
        was_ticking
    }

    /// Whether `id` is the countdown this owner last started and has not
    /// cancelled. Messages from any other id are stale.
    pub fn is_current(&self, id: CountdownId) -> bool {
        self.running.as_ref().map(|r| r.id == id).unwrap_or(false)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| !r.task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}
