// src/poller/watcher.rs
// Slow background check that hands a running job to the fast progress poller

use super::{ticker, PollToken, PollerHandle, ProgressPoller};
use crate::api::SearchBackend;
use std::sync::Arc;
use std::time::Duration;

/// Cheap "is anything happening?" loop.
///
/// When it sees an active job and the fast poller is idle it starts the fast
/// poller. Because starting always cancels a previous fast loop, a watcher
/// hand-off racing a manual start still leaves exactly one fast loop.
pub struct BackgroundWatcher {
    backend: Arc<dyn SearchBackend>,
    handle: PollerHandle,
    fast: Arc<ProgressPoller>,
    fast_interval: Duration,
}

impl BackgroundWatcher {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        fast: Arc<ProgressPoller>,
        fast_interval: Duration,
    ) -> Self {
        Self {
            backend,
            handle: PollerHandle::new("background-watcher"),
            fast,
            fast_interval,
        }
    }

    pub fn start(&self, interval: Duration) -> PollToken {
        let backend = self.backend.clone();
        let fast = self.fast.clone();
        let fast_interval = self.fast_interval;

        self.handle.spawn(move |token| async move {
            let mut ticker = ticker(interval);

            loop {
                ticker.tick().await;

                let result = backend.embedding_progress().await;
                if !token.is_current() {
                    return;
                }

                match result {
                    Ok(snapshot) if snapshot.active && !fast.is_running() => {
                        tracing::info!(
                            "Background embedding job detected ({}), starting progress tracking",
                            snapshot.stage
                        );
                        fast.start_tracking_job(fast_interval);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("Background progress check failed: {}", e),
                }
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
