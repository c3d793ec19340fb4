// src/poller/status.rs
// Readiness poller for GET /api/search/status

use super::{ticker, PollToken, PollerHandle};
use crate::api::{ReadinessStatus, SearchBackend};
use std::sync::Arc;
use std::time::Duration;

pub struct StatusPoller {
    backend: Arc<dyn SearchBackend>,
    handle: PollerHandle,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            handle: PollerHandle::new("status-poller"),
        }
    }

    /// Poll every `interval` until the model reports ready.
    ///
    /// `on_tick` sees every parsed status, ready or not. `on_ready` runs once,
    /// after the poller has already stopped itself. Failed requests are logged
    /// and skipped. Starting again cancels the previous loop.
    pub fn start<T, R>(&self, interval: Duration, mut on_tick: T, on_ready: R) -> PollToken
    where
        T: FnMut(&ReadinessStatus) + Send + 'static,
        R: FnOnce(ReadinessStatus) + Send + 'static,
    {
        let backend = self.backend.clone();

        self.handle.spawn(move |token| async move {
            let mut ticker = ticker(interval);
            let mut cycle: u32 = 0;

            loop {
                ticker.tick().await;
                cycle += 1;

                let result = backend.search_status().await;
                if !token.is_current() {
                    tracing::debug!("Dropping stale status response (cycle {})", cycle);
                    return;
                }

                match result {
                    Ok(status) => {
                        on_tick(&status);
                        if status.is_ready() {
                            tracing::info!(
                                "Model '{}' ready after {} status checks",
                                status.resource_label,
                                cycle
                            );
                            token.finish();
                            on_ready(status);
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Status check {} failed: {}", cycle, e);
                    }
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
