// src/api/mock.rs
// Scripted in-memory backend for tests

use super::{
    ApiError, GenerateResponse, ImageDetails, ModelInfo, ModelState, ProgressSnapshot,
    ReadinessStatus, SearchBackend, SearchKind, SearchOutcome, SearchRequest, SearchResponse,
    ServerStatus,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Replays queued answers in order; the last answer of a queue repeats forever.
#[derive(Default)]
pub struct ScriptedBackend {
    statuses: Mutex<VecDeque<Result<ReadinessStatus, ApiError>>>,
    searches: Mutex<VecDeque<Result<SearchOutcome, ApiError>>>,
    progress: Mutex<VecDeque<Result<ProgressSnapshot, ApiError>>>,
    server: Mutex<VecDeque<Result<ServerStatus, ApiError>>>,
    generate: Mutex<VecDeque<Result<GenerateResponse, ApiError>>>,
    status_delay: Mutex<Duration>,
    search_log: Mutex<Vec<(SearchKind, SearchRequest)>>,
    pub status_calls: AtomicU32,
    pub search_calls: AtomicU32,
    pub progress_calls: AtomicU32,
    pub server_calls: AtomicU32,
}

fn next<T: Clone>(queue: &Mutex<VecDeque<Result<T, ApiError>>>) -> Result<T, ApiError> {
    let mut queue = queue.lock().unwrap();
    match queue.len() {
        0 => Err(ApiError::Network("no scripted response".to_string())),
        1 => queue[0].clone(),
        _ => queue.pop_front().unwrap(),
    }
}

pub fn loading(alias: &str) -> ReadinessStatus {
    ReadinessStatus::new(ModelState::Loading, alias)
}

pub fn ready(alias: &str) -> ReadinessStatus {
    ReadinessStatus::new(ModelState::Ready, alias)
}

pub fn model_loading() -> SearchOutcome {
    SearchOutcome::ModelLoading {
        message: "Model 'clip' is currently loading".to_string(),
    }
}

pub fn results(total: u64) -> SearchOutcome {
    SearchOutcome::Results(SearchResponse {
        results: (0..total).map(|i| json!({ "hash": format!("h{}", i) })).collect(),
        total,
        ..Default::default()
    })
}

pub fn snapshot(active: bool, current: u64, total: u64) -> ProgressSnapshot {
    ProgressSnapshot {
        active,
        stage: if active { "Generating" } else { "Completed" }.to_string(),
        current,
        total,
        percentage: if total == 0 {
            0.0
        } else {
            current as f64 * 100.0 / total as f64
        },
        processed_count: current,
        ..Default::default()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, items: Vec<Result<ReadinessStatus, ApiError>>) -> Self {
        *self.statuses.lock().unwrap() = items.into();
        self
    }

    pub fn with_searches(self, items: Vec<Result<SearchOutcome, ApiError>>) -> Self {
        *self.searches.lock().unwrap() = items.into();
        self
    }

    pub fn with_progress(self, items: Vec<Result<ProgressSnapshot, ApiError>>) -> Self {
        *self.progress.lock().unwrap() = items.into();
        self
    }

    pub fn with_server_status(self, items: Vec<Result<ServerStatus, ApiError>>) -> Self {
        *self.server.lock().unwrap() = items.into();
        self
    }

    pub fn with_generate(self, items: Vec<Result<GenerateResponse, ApiError>>) -> Self {
        *self.generate.lock().unwrap() = items.into();
        self
    }

    /// Every status request takes this long to answer
    pub fn with_status_delay(self, delay: Duration) -> Self {
        *self.status_delay.lock().unwrap() = delay;
        self
    }

    pub fn search_log(&self) -> Vec<(SearchKind, SearchRequest)> {
        self.search_log.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search_status(&self) -> Result<ReadinessStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        let answer = next(&self.statuses);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        answer
    }

    async fn search(
        &self,
        kind: SearchKind,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, ApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.search_log
            .lock()
            .unwrap()
            .push((kind, request.clone()));
        next(&self.searches)
    }

    async fn embedding_progress(&self) -> Result<ProgressSnapshot, ApiError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.progress)
    }

    async fn generate_embeddings(&self) -> Result<GenerateResponse, ApiError> {
        next(&self.generate)
    }

    async fn server_status(&self) -> Result<ServerStatus, ApiError> {
        self.server_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.server)
    }

    async fn image_details(&self, hash: &str) -> Result<ImageDetails, ApiError> {
        Err(ApiError::Http {
            status: 404,
            message: format!("Image not found: {}", hash),
        })
    }

    async fn load_model(&self) -> Result<String, ApiError> {
        Ok("Model clip loaded successfully".to_string())
    }

    async fn unload_model(&self) -> Result<String, ApiError> {
        Ok("Model clip unloaded successfully".to_string())
    }

    async fn model_status(&self) -> Result<ModelInfo, ApiError> {
        Ok(ModelInfo {
            alias: "clip".to_string(),
            status: "LOADED".to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
