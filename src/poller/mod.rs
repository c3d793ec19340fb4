// src/poller/mod.rs
// Timer-driven polling loops and the handle that owns them

mod progress;
mod stats;
mod status;
mod watcher;

pub use progress::{ProgressEvent, ProgressPoller, ProgressSink};
pub use stats::{StatsEvent, StatsRefresher, StatsSink};
pub use status::StatusPoller;
pub use watcher::BackgroundWatcher;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Shortest period a poller will run at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Slot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns at most one running poll loop.
///
/// Starting a loop bumps the generation and aborts whatever ran before, so a
/// handle never drives two loops at once. Each loop gets a [`PollToken`] for
/// the generation it was started under and must check it before applying a
/// response: an aborted timer does not cancel a request already on the wire.
#[derive(Clone)]
pub struct PollerHandle {
    name: &'static str,
    slot: Arc<Mutex<Slot>>,
}

impl PollerHandle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Cancel the running loop (if any) and spawn the one built by `make`.
    pub fn spawn<F, Fut>(&self, make: F) -> PollToken
    where
        F: FnOnce(PollToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        slot.generation += 1;

        if let Some(previous) = slot.task.take() {
            previous.abort();
            tracing::debug!("{}: replaced running poller", self.name);
        }

        let token = PollToken {
            generation: slot.generation,
            slot: self.slot.clone(),
        };
        slot.task = Some(tokio::spawn(make(token.clone())));

        tracing::debug!("{}: started generation {}", self.name, token.generation);
        token
    }

    /// Idempotent. Returns true if a loop was running.
    pub fn stop(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.generation += 1;

        match slot.task.take() {
            Some(task) => {
                task.abort();
                tracing::debug!("{}: stopped", self.name);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.slot)
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

}

/// Identifies one started loop of a [`PollerHandle`].
#[derive(Clone)]
pub struct PollToken {
    generation: u64,
    slot: Arc<Mutex<Slot>>,
}

impl PollToken {
    /// False once the loop was stopped or replaced
    pub fn is_current(&self) -> bool {
        lock(&self.slot).generation == self.generation
    }

    /// Called by a loop that ends on its own. Returns false if it was already superseded.
    pub fn finish(&self) -> bool {
        let mut slot = lock(&self.slot);
        if slot.generation != self.generation {
            return false;
        }
        slot.generation += 1;
        // dropping the JoinHandle detaches; the loop is about to return anyway
        slot.task.take();
        true
    }
}

/// Like `setInterval`: the first tick fires one period after start.
pub(crate) fn ticker(period: Duration) -> Interval {
    let period = period.max(MIN_POLL_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
