use crate::api::{
    ApiError, ReadinessStatus, SearchBackend, SearchKind, SearchOutcome, SearchRequest,
    SearchResponse,
};
use crate::config::ClientConfig;
use crate::poller::StatusPoller;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use self::deadline::WaitPolicy;
use self::metrics::{EndpointMetrics, Metrics};
use self::state::{loading_message, DispatchState, PendingOperation, TickDecision};

pub mod deadline;
pub mod metrics;
pub mod state;

pub type ProgressListener = Arc<dyn Fn(String) + Send + Sync>;

/// Runs searches against a backend whose model may still be loading.
///
/// The request is sent right away. A "model loading" answer parks it: the
/// status poller runs until the model is ready, then the identical request is
/// sent exactly once more and its outcome is final. Only the newest call may
/// wait; an older call that is still waiting resolves to `Cancelled`.
pub struct GatedDispatcher {
    backend: Arc<dyn SearchBackend>,
    poller: StatusPoller,
    policy: WaitPolicy,
    generation: AtomicU64,
    /// Serializes the currency check around starting the status poller
    start_guard: Mutex<()>,
    state: Mutex<DispatchState>,
    metrics: Mutex<Metrics>,
    listener: Option<ProgressListener>,
}

impl GatedDispatcher {
    pub fn new(backend: Arc<dyn SearchBackend>, policy: WaitPolicy) -> Self {
        Self {
            poller: StatusPoller::new(backend.clone()),
            backend,
            policy,
            generation: AtomicU64::new(0),
            start_guard: Mutex::new(()),
            state: Mutex::new(DispatchState::Idle),
            metrics: Mutex::new(Metrics::new()),
            listener: None,
        }
    }

    pub fn from_config(backend: Arc<dyn SearchBackend>, config: &ClientConfig) -> Self {
        Self::new(backend, WaitPolicy::from_config(config))
    }

    /// Receives the "Model '...' is loading" text on every wait tick
    pub fn with_progress_listener(mut self, listener: ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> DispatchState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(DispatchState::Idle)
    }

    pub fn metrics(&self, kind: SearchKind) -> EndpointMetrics {
        self.metrics
            .lock()
            .map(|metrics| metrics.get(kind))
            .unwrap_or_default()
    }

    pub fn is_waiting(&self) -> bool {
        self.poller.is_running()
    }

    /// Abandon whatever call is in flight or waiting
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.poller.stop() {
            tracing::info!("Pending search cancelled");
        }
        self.set_state(DispatchState::Idle);
    }

    pub async fn execute(
        &self,
        kind: SearchKind,
        request: SearchRequest,
    ) -> Result<SearchResponse, ApiError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if self.poller.stop() {
            tracing::info!("New search replaces the one waiting for the model");
        }

        self.transition(generation, DispatchState::Polling);
        self.record(|m| m.record_primary(kind));

        tracing::info!(
            "Search ({}): query='{}' max_results={}",
            kind.as_str(),
            request.query,
            request.max_results
        );

        let outcome = self.backend.search(kind, &request).await;
        if !self.is_current(generation) {
            return Err(ApiError::Cancelled);
        }

        match outcome {
            Ok(SearchOutcome::Results(response)) => {
                self.transition(generation, DispatchState::Done);
                Ok(response)
            }
            Ok(SearchOutcome::ModelLoading { message }) => {
                tracing::info!("Backend not ready: {}", message);
                let pending = PendingOperation::new(kind, request, generation, &self.policy);
                self.wait_and_retry(pending).await
            }
            Err(e) => {
                self.transition(generation, DispatchState::Done);
                Err(e)
            }
        }
    }

    async fn wait_and_retry(
        &self,
        mut pending: PendingOperation,
    ) -> Result<SearchResponse, ApiError> {
        let generation = pending.generation;
        self.transition(generation, DispatchState::Waiting);
        self.record(|m| m.record_wait(pending.kind));

        let (tx, mut rx) = mpsc::unbounded_channel::<ReadinessStatus>();
        self.start_waiting(generation, tx)?;

        loop {
            let status = match tokio::time::timeout_at(pending.deadline, rx.recv()).await {
                Ok(Some(status)) => status,
                // poller went away: a newer call or cancel() stopped it
                Ok(None) => return Err(ApiError::Cancelled),
                Err(_) => return Err(self.expire(&pending)),
            };

            if !self.is_current(generation) {
                return Err(ApiError::Cancelled);
            }

            if let Some(listener) = self.listener.as_ref().filter(|_| !status.is_ready()) {
                listener(loading_message(&status, pending.waited()));
            }

            match pending.on_tick(&status, &self.policy) {
                TickDecision::KeepWaiting => continue,
                TickDecision::Expired => return Err(self.expire(&pending)),
                TickDecision::Retry => break,
            }
        }

        tracing::info!(
            "Model ready after {} checks, retrying search '{}'",
            pending.attempts_made,
            pending.payload.query
        );
        self.transition(generation, DispatchState::Polling);
        self.record(|m| m.record_retry(pending.kind));

        let outcome = self.backend.search(pending.kind, &pending.payload).await;
        if !self.is_current(generation) {
            return Err(ApiError::Cancelled);
        }
        self.transition(generation, DispatchState::Done);

        match outcome {
            Ok(SearchOutcome::Results(response)) => Ok(response),
            Ok(SearchOutcome::ModelLoading { message }) => {
                tracing::warn!("Backend still loading after readiness: {}", message);
                Err(ApiError::Application(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Start the status poller for `generation` unless a newer call or
    /// `cancel()` got there first. Never leaves a poller running for a stale call.
    fn start_waiting(
        &self,
        generation: u64,
        tx: mpsc::UnboundedSender<ReadinessStatus>,
    ) -> Result<(), ApiError> {
        let _guard = self
            .start_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !self.is_current(generation) {
            return Err(ApiError::Cancelled);
        }

        self.poller.start(
            self.policy.interval,
            move |status| {
                let _ = tx.send(status.clone());
            },
            |status| tracing::debug!("Readiness confirmed for '{}'", status.resource_label),
        );

        // cancel() does not take the guard and may have run since the check
        if !self.is_current(generation) {
            self.poller.stop();
            return Err(ApiError::Cancelled);
        }
        Ok(())
    }

    fn expire(&self, pending: &PendingOperation) -> ApiError {
        if self.is_current(pending.generation) {
            self.poller.stop();
        }
        tracing::warn!(
            "Search '{}' timed out waiting for the model after {} checks",
            pending.payload.query,
            pending.attempts_made
        );
        self.transition(pending.generation, DispatchState::TimedOut);
        self.record(|m| m.record_timeout(pending.kind));
        ApiError::Timeout {
            polls: pending.attempts_made,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn transition(&self, generation: u64, next: DispatchState) {
        if self.is_current(generation) {
            self.set_state(next);
        }
    }

    fn set_state(&self, next: DispatchState) {
        if let Ok(mut state) = self.state.lock() {
            tracing::debug!("Dispatcher {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn record(&self, f: impl FnOnce(&mut Metrics)) {
        if let Ok(mut metrics) = self.metrics.lock() {
            f(&mut metrics);
        }
    }
}
