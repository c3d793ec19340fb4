// src/poller/progress.rs
// Fast poller observing the backend's embedding job

use super::{ticker, PollToken, PollerHandle};
use crate::api::{ProgressSnapshot, SearchBackend};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "snapshot", rename_all = "snake_case")]
pub enum ProgressEvent {
    Snapshot(ProgressSnapshot),
    /// The job went from active to inactive; emitted once, then polling stops
    Completed(ProgressSnapshot),
}

pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

pub struct ProgressPoller {
    backend: Arc<dyn SearchBackend>,
    handle: PollerHandle,
    sink: ProgressSink,
}

impl ProgressPoller {
    pub fn new(backend: Arc<dyn SearchBackend>, sink: ProgressSink) -> Self {
        Self {
            backend,
            handle: PollerHandle::new("progress-poller"),
            sink,
        }
    }

    pub fn start(&self, interval: Duration) -> PollToken {
        self.start_with(interval, false)
    }

    /// Start polling knowing a job is already running (we just triggered it, or
    /// the background watcher saw it). A job that finishes before the first tick
    /// then still produces its completion event.
    pub fn start_tracking_job(&self, interval: Duration) -> PollToken {
        self.start_with(interval, true)
    }

    fn start_with(&self, interval: Duration, job_known_active: bool) -> PollToken {
        let backend = self.backend.clone();
        let sink = self.sink.clone();

        self.handle.spawn(move |token| async move {
            let mut ticker = ticker(interval);
            let mut was_active = job_known_active;

            loop {
                ticker.tick().await;

                let result = backend.embedding_progress().await;
                if !token.is_current() {
                    tracing::debug!("Dropping stale progress response");
                    return;
                }

                let snapshot = match result {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!("Progress check failed: {}", e);
                        continue;
                    }
                };

                if was_active && !snapshot.active {
                    tracing::info!(
                        "Embedding job finished: processed={}, skipped={}, errors={}",
                        snapshot.processed_count,
                        snapshot.skipped_count,
                        snapshot.error_count
                    );
                    token.finish();
                    sink(ProgressEvent::Completed(snapshot));
                    return;
                }

                was_active = snapshot.active;
                tracing::debug!(
                    "Embedding progress: {} {}/{} ({:.1}%)",
                    snapshot.stage,
                    snapshot.current,
                    snapshot.total,
                    snapshot.percentage
                );
                sink(ProgressEvent::Snapshot(snapshot));
            }
        })
    }

    pub fn stop(&self) -> bool {
        self.handle.stop()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{snapshot, ScriptedBackend};
    use crate::api::ApiError;
    use std::sync::Mutex;

    fn collecting_sink() -> (ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let store = events.clone();
        let sink: ProgressSink = Arc::new(move |event| store.lock().unwrap().push(event));
        (sink, events)
    }

    fn completions(events: &Mutex<Vec<ProgressEvent>>) -> usize {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Completed(_)))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn completes_once_when_job_stops_being_active() {
        let backend = Arc::new(ScriptedBackend::new().with_progress(vec![
            Ok(snapshot(true, 1, 4)),
            Ok(snapshot(true, 3, 4)),
            Ok(snapshot(false, 4, 4)),
        ]));
        let (sink, events) = collecting_sink();
        let poller = ProgressPoller::new(backend.clone(), sink);

        poller.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(30)).await;

        let events = events.lock().unwrap().clone();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ProgressEvent::Snapshot(_)));
        assert!(matches!(events[1], ProgressEvent::Snapshot(_)));
        assert_eq!(events[2], ProgressEvent::Completed(snapshot(false, 4, 4)));
        assert_eq!(ScriptedBackend::count(&backend.progress_calls), 3);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_backend_never_reports_completion() {
        let backend = Arc::new(ScriptedBackend::new().with_progress(vec![Ok(snapshot(false, 0, 0))]));
        let (sink, events) = collecting_sink();
        let poller = ProgressPoller::new(backend.clone(), sink);

        poller.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(5500)).await;

        assert_eq!(completions(&events), 0);
        assert_eq!(events.lock().unwrap().len(), 5);
        assert!(poller.is_running());
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn tracked_job_that_already_finished_completes_on_first_tick() {
        let backend = Arc::new(ScriptedBackend::new().with_progress(vec![Ok(snapshot(false, 2, 2))]));
        let (sink, events) = collecting_sink();
        let poller = ProgressPoller::new(backend.clone(), sink);

        poller.start_tracking_job(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(completions(&events), 1);
        assert_eq!(ScriptedBackend::count(&backend.progress_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_checks_are_skipped() {
        let backend = Arc::new(ScriptedBackend::new().with_progress(vec![
            Ok(snapshot(true, 1, 2)),
            Err(ApiError::Application("Redis not connected".to_string())),
            Ok(snapshot(false, 2, 2)),
        ]));
        let (sink, events) = collecting_sink();
        let poller = ProgressPoller::new(backend, sink);

        poller.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(events.lock().unwrap().len(), 2);
        assert_eq!(completions(&events), 1);
    }
}
