// src/poller/stats.rs
// Periodic refresh of GET /api/status for the debug panel

use super::{PollToken, PollerHandle, MIN_POLL_INTERVAL};
use crate::api::{SearchBackend, ServerStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StatsEvent {
    Updated(ServerStatus),
    Failed(String),
}

pub type StatsSink = Arc<dyn Fn(StatsEvent) + Send + Sync>;

pub struct StatsRefresher {
    backend: Arc<dyn SearchBackend>,
    handle: PollerHandle,
    sink: StatsSink,
}

impl StatsRefresher {
    pub fn new(backend: Arc<dyn SearchBackend>, sink: StatsSink) -> Self {
        Self {
            backend,
            handle: PollerHandle::new("stats-refresher"),
            sink,
        }
    }

    /// Fetch right away, then every `interval`
    pub fn start(&self, interval: Duration) -> PollToken {
        let backend = self.backend.clone();
        let sink = self.sink.clone();

        self.handle.spawn(move |token| async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let result = backend.server_status().await;
                if !token.is_current() {
                    return;
                }

                match result {
                    Ok(status) => sink(StatsEvent::Updated(status)),
                    Err(e) => {
                        tracing::warn!("Statistics refresh failed: {}", e);
                        sink(StatsEvent::Failed(e.to_string()));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedBackend;
    use crate::api::{ApiError, ServerStatistics};
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn refreshes_immediately_then_on_interval() {
        let status = ServerStatus {
            status: "healthy".to_string(),
            statistics: ServerStatistics {
                total_images: 12,
                ..Default::default()
            },
            ..Default::default()
        };
        let backend = Arc::new(ScriptedBackend::new().with_server_status(vec![
            Ok(status.clone()),
            Err(ApiError::Http {
                status: 500,
                message: "Redis down".to_string(),
            }),
            Ok(status.clone()),
        ]));
        let events = Arc::new(Mutex::new(Vec::new()));
        let store = events.clone();
        let refresher = StatsRefresher::new(
            backend.clone(),
            Arc::new(move |event| store.lock().unwrap().push(event)),
        );

        refresher.start(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(61)).await;
        refresher.stop();

        let events = events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                StatsEvent::Updated(status.clone()),
                StatsEvent::Failed("HTTP 500: Redis down".to_string()),
                StatsEvent::Updated(status),
            ]
        );
        assert_eq!(ScriptedBackend::count(&backend.server_calls), 3);
    }
}
