use super::deadline::WaitPolicy;
use crate::api::{ReadinessStatus, SearchKind, SearchRequest};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    /// A search request is on the wire
    Polling,
    /// The backend answered "model loading"; watching readiness
    Waiting,
    Done,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    KeepWaiting,
    /// Model is ready: re-issue the original request
    Retry,
    Expired,
}

/// A gated request parked until the model is ready
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub kind: SearchKind,
    pub payload: SearchRequest,
    pub attempts_made: u32,
    pub started: Instant,
    pub deadline: Instant,
    pub generation: u64,
}

impl PendingOperation {
    pub fn new(
        kind: SearchKind,
        payload: SearchRequest,
        generation: u64,
        policy: &WaitPolicy,
    ) -> Self {
        let started = Instant::now();
        Self {
            kind,
            payload,
            attempts_made: 0,
            started,
            deadline: policy.deadline_from(started),
            generation,
        }
    }

    /// Single transition for one readiness poll
    pub fn on_tick(&mut self, status: &ReadinessStatus, policy: &WaitPolicy) -> TickDecision {
        self.attempts_made += 1;

        if status.is_ready() {
            TickDecision::Retry
        } else if policy.is_exhausted(self.attempts_made) {
            TickDecision::Expired
        } else {
            TickDecision::KeepWaiting
        }
    }

    pub fn waited(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Text shown while a search waits on the model
pub fn loading_message(status: &ReadinessStatus, waited: Duration) -> String {
    let label = if status.resource_label.is_empty() {
        "search"
    } else {
        status.resource_label.as_str()
    };
    format!("Model '{}' is loading... ({}s)", label, waited.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{loading, ready};

    fn pending(policy: &WaitPolicy) -> PendingOperation {
        PendingOperation::new(SearchKind::Image, SearchRequest::new("dogs"), 1, policy)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_on_first_ready_tick() {
        let policy = WaitPolicy::new(Duration::from_secs(1), 60);
        let mut op = pending(&policy);

        assert_eq!(op.on_tick(&loading("clip"), &policy), TickDecision::KeepWaiting);
        assert_eq!(op.on_tick(&loading("clip"), &policy), TickDecision::KeepWaiting);
        assert_eq!(op.on_tick(&ready("clip"), &policy), TickDecision::Retry);
        assert_eq!(op.attempts_made, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn expires_on_last_allowed_tick() {
        let policy = WaitPolicy::new(Duration::from_secs(1), 2);
        let mut op = pending(&policy);

        assert_eq!(op.on_tick(&loading("clip"), &policy), TickDecision::KeepWaiting);
        assert_eq!(op.on_tick(&loading("clip"), &policy), TickDecision::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_last_allowed_tick_still_retries() {
        let policy = WaitPolicy::new(Duration::from_secs(1), 1);
        let mut op = pending(&policy);
        assert_eq!(op.on_tick(&ready("clip"), &policy), TickDecision::Retry);
    }

    #[test]
    fn loading_message_names_the_model() {
        assert_eq!(
            loading_message(&loading("clip-vit"), Duration::from_millis(4200)),
            "Model 'clip-vit' is loading... (4s)"
        );
    }
}
