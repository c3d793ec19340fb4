use crate::api::{
    ApiError, GenerateResponse, ImageDetails, ModelInfo, ProgressSnapshot, RequestOptions,
    SearchBackend, SearchKind, SearchRequest, SearchResponse, ServerStatus,
};
use crate::config::ClientConfig;
use crate::dispatcher::GatedDispatcher;
use crate::poller::{
    BackgroundWatcher, ProgressEvent, ProgressPoller, StatsEvent, StatsRefresher,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod events;
pub mod notify;

pub use events::UiEvent;
pub use notify::{toast_for_error, Toast, ToastLevel};

const EVENT_CAPACITY: usize = 256;

/// One logical UI session against the search server.
///
/// Owns exactly one dispatcher, one progress poller, one background watcher
/// and one statistics refresher. Everything observable is published as
/// [`UiEvent`]s; call [`SearchSession::subscribe`] to render them.
pub struct SearchSession {
    id: String,
    config: ClientConfig,
    backend: Arc<dyn SearchBackend>,
    dispatcher: GatedDispatcher,
    progress: Arc<ProgressPoller>,
    watcher: BackgroundWatcher,
    stats: StatsRefresher,
    events: broadcast::Sender<UiEvent>,
}

impl SearchSession {
    pub fn new(backend: Arc<dyn SearchBackend>, config: ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let loading_tx = events.clone();
        let dispatcher = GatedDispatcher::from_config(backend.clone(), &config)
            .with_progress_listener(Arc::new(move |text| {
                let _ = loading_tx.send(UiEvent::LoadingProgress { text });
            }));

        let progress_tx = events.clone();
        let progress = Arc::new(ProgressPoller::new(
            backend.clone(),
            Arc::new(move |event| forward_progress(&progress_tx, event)),
        ));

        let watcher = BackgroundWatcher::new(
            backend.clone(),
            progress.clone(),
            config.progress_poll_interval(),
        );

        let stats_tx = events.clone();
        let stats = StatsRefresher::new(
            backend.clone(),
            Arc::new(move |event| {
                let event = match event {
                    StatsEvent::Updated(status) => UiEvent::Stats { status },
                    StatsEvent::Failed(message) => UiEvent::StatsError { message },
                };
                let _ = stats_tx.send(event);
            }),
        );

        let id = Uuid::new_v4().to_string();
        tracing::info!("Session {} started (backend: {})", id, backend.name());

        Self {
            id,
            config,
            backend,
            dispatcher,
            progress,
            watcher,
            stats,
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &GatedDispatcher {
        &self.dispatcher
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: UiEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn notify(&self, toast: Toast) {
        self.emit(UiEvent::Toast { toast });
    }

    /// Single interception point for request failures: turns them into error
    /// toasts unless the caller set `skip_notification`.
    pub fn surface<T>(
        &self,
        result: Result<T, ApiError>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        if let Err(e) = &result {
            if let Some(toast) = toast_for_error(e, options) {
                tracing::warn!("Request failed: {}", e);
                self.notify(toast);
            } else if e.is_retryable() {
                tracing::debug!("Request failed, caller may retry: {}", e);
            }
        }
        result
    }

    /// Gated search. A loading model is waited on, not reported as a failure.
    pub async fn search(
        &self,
        query: &str,
        kind: SearchKind,
    ) -> Result<SearchResponse, ApiError> {
        let mut request = SearchRequest::new(query).with_max_results(self.config.max_results);
        if kind == SearchKind::Hybrid {
            request = request.with_hybrid_function(self.config.hybrid_function);
        }

        if request.query.is_empty() {
            let error = ApiError::Application("Search query is required".to_string());
            self.emit(UiEvent::SearchFailed {
                message: error.to_string(),
            });
            return self.surface(Err(error), RequestOptions::default());
        }

        self.emit(UiEvent::SearchStarted {
            query: request.query.clone(),
            kind,
        });

        let result = self.dispatcher.execute(kind, request).await;
        match &result {
            Ok(response) => {
                if let Some(warning) = &response.warning {
                    self.notify(Toast::warning(warning.message.clone()));
                }
                self.emit(UiEvent::SearchCompleted {
                    response: response.clone(),
                });
            }
            Err(ApiError::Cancelled) => {
                tracing::debug!("Search superseded");
            }
            Err(e) => {
                self.emit(UiEvent::SearchFailed {
                    message: e.to_string(),
                });
            }
        }

        self.surface(result, RequestOptions::default())
    }

    /// Ask the server to start embedding generation and follow its progress
    pub async fn generate_embeddings(
        &self,
        options: RequestOptions,
    ) -> Result<GenerateResponse, ApiError> {
        let result = self
            .backend
            .generate_embeddings()
            .await
            .and_then(GenerateResponse::into_result);
        let response = self.surface(result, options)?;

        let message = response
            .message
            .clone()
            .unwrap_or_else(|| "Embedding generation started".to_string());
        self.notify(Toast::info(message));
        self.progress
            .start_tracking_job(self.config.progress_poll_interval());

        Ok(response)
    }

    pub async fn image_details(
        &self,
        hash: &str,
        options: RequestOptions,
    ) -> Result<ImageDetails, ApiError> {
        let result = self.backend.image_details(hash).await;
        self.surface(result, options)
    }

    pub async fn server_status(&self, options: RequestOptions) -> Result<ServerStatus, ApiError> {
        let result = self.backend.server_status().await;
        self.surface(result, options)
    }

    pub async fn model_status(&self, options: RequestOptions) -> Result<ModelInfo, ApiError> {
        let result = self.backend.model_status().await;
        self.surface(result, options)
    }

    pub async fn load_model(&self, options: RequestOptions) -> Result<String, ApiError> {
        let result = self.backend.load_model().await;
        let message = self.surface(result, options)?;
        self.notify(Toast::success(message.clone()));
        Ok(message)
    }

    pub async fn unload_model(&self, options: RequestOptions) -> Result<String, ApiError> {
        let result = self.backend.unload_model().await;
        let message = self.surface(result, options)?;
        self.notify(Toast::success(message.clone()));
        Ok(message)
    }

    pub async fn embedding_progress(
        &self,
        options: RequestOptions,
    ) -> Result<ProgressSnapshot, ApiError> {
        let result = self
            .backend
            .embedding_progress()
            .await
            .map(ProgressSnapshot::normalized);
        self.surface(result, options)
    }

    /// Follow the embedding job at full rate
    pub fn watch_progress(&self) {
        self.progress.start(self.config.progress_poll_interval());
    }

    /// Like [`SearchSession::watch_progress`] for a job already known to run,
    /// so a job that ends before the first tick still reports completion
    pub fn track_job(&self) {
        self.progress
            .start_tracking_job(self.config.progress_poll_interval());
    }

    pub fn stop_progress(&self) {
        self.progress.stop();
    }

    pub fn is_tracking_progress(&self) -> bool {
        self.progress.is_running()
    }

    /// Debug panel mode: slow job detection plus periodic statistics
    pub fn start_monitoring(&self) {
        self.watcher.start(self.config.background_check_interval());
        self.stats.start(self.config.stats_refresh_interval());
    }

    pub fn stop_monitoring(&self) {
        self.watcher.stop();
        self.stats.stop();
    }

    pub fn shutdown(&self) {
        self.dispatcher.cancel();
        self.progress.stop();
        self.stop_monitoring();
        tracing::debug!("Session {} shut down", self.id);
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn forward_progress(events: &broadcast::Sender<UiEvent>, event: ProgressEvent) {
    match event {
        ProgressEvent::Snapshot(snapshot) => {
            let _ = events.send(UiEvent::Progress { snapshot });
        }
        ProgressEvent::Completed(snapshot) => {
            let toast = Toast::success(format!(
                "Embedding generation completed: {} processed, {} skipped, {} errors",
                snapshot.processed_count, snapshot.skipped_count, snapshot.error_count
            ));
            let _ = events.send(UiEvent::ProgressCompleted { snapshot });
            let _ = events.send(UiEvent::Toast { toast });
        }
    }
}
