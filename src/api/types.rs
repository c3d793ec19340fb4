// src/api/types.rs
// Wire types and error definitions for the search backend

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result counts the backend accepts; anything else falls back to the default.
pub const ALLOWED_MAX_RESULTS: [u32; 4] = [4, 8, 16, 32];
pub const DEFAULT_MAX_RESULTS: u32 = 8;
pub const DEFAULT_HYBRID_FUNCTION: u32 = 1;

/// Marker the backend puts in a `202` body while the model is warming up
pub const MODEL_LOADING_MARKER: &str = "model_loading";

pub fn normalize_max_results(requested: u32) -> u32 {
    if ALLOWED_MAX_RESULTS.contains(&requested) {
        requested
    } else {
        DEFAULT_MAX_RESULTS
    }
}

/// Load state of the search model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Unknown,
}

impl ModelState {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unloaded" => ModelState::Unloaded,
            "loading" => ModelState::Loading,
            "loaded" | "ready" => ModelState::Ready,
            _ => ModelState::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Ready => "loaded",
            ModelState::Unknown => "unknown",
        }
    }
}

/// One readiness poll of `GET /api/search/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessStatus {
    pub state: ModelState,
    /// Model alias reported by the backend
    pub resource_label: String,
}

impl ReadinessStatus {
    pub fn new(state: ModelState, resource_label: impl Into<String>) -> Self {
        Self {
            state,
            resource_label: resource_label.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == ModelState::Ready
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawSearchStatus {
    model_status: Option<String>,
    ready_for_search: bool,
    model_alias: String,
}

impl From<RawSearchStatus> for ReadinessStatus {
    fn from(raw: RawSearchStatus) -> Self {
        let state = if raw.ready_for_search {
            ModelState::Ready
        } else {
            raw.model_status
                .as_deref()
                .map(ModelState::from_wire)
                .unwrap_or(ModelState::Unknown)
        };

        ReadinessStatus {
            state,
            resource_label: raw.model_alias,
        }
    }
}

/// Point-in-time read of the backend's embedding job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSnapshot {
    pub active: bool,
    pub stage: String,
    pub current: u64,
    pub total: u64,
    pub percentage: f64,
    #[serde(rename = "processed")]
    pub processed_count: u64,
    #[serde(rename = "skipped")]
    pub skipped_count: u64,
    #[serde(rename = "errors")]
    pub error_count: u64,
    #[serde(rename = "elapsed_time")]
    pub elapsed_seconds: f64,
}

impl ProgressSnapshot {
    /// Clamp values the backend may report out of range
    pub fn normalized(mut self) -> Self {
        self.percentage = if self.percentage.is_finite() {
            self.percentage.clamp(0.0, 100.0)
        } else {
            0.0
        };
        if !self.elapsed_seconds.is_finite() || self.elapsed_seconds < 0.0 {
            self.elapsed_seconds = 0.0;
        }
        self
    }
}

/// Which search endpoint a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    /// `POST /search`
    Image,
    /// `POST /search_complex`
    Hybrid,
}

impl SearchKind {
    pub fn path(&self) -> &'static str {
        match self {
            SearchKind::Image => "/search",
            SearchKind::Hybrid => "/search_complex",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Image => "image",
            SearchKind::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hybrid_function: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into().trim().to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            hybrid_function: None,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = normalize_max_results(max_results);
        self
    }

    pub fn with_hybrid_function(mut self, function: u32) -> Self {
        self.hybrid_function = Some(function);
        self
    }
}

/// Present when `/search_complex` fell back to plain image search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchWarning {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub reason: Option<String>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub query: Option<String>,
    pub model: Option<String>,
    pub search_type: Option<String>,
    pub results: Vec<Value>,
    pub total: u64,
    pub warning: Option<SearchWarning>,
    pub message: Option<String>,
}

/// What a search endpoint answered
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Results(SearchResponse),
    /// `202 { status: "model_loading" }`: the request was not served
    ModelLoading { message: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoadingNotice {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub processed: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl GenerateResponse {
    /// `success: false` is an application error even though the HTTP call succeeded
    pub fn into_result(self) -> Result<GenerateResponse, ApiError> {
        if self.success {
            return Ok(self);
        }
        let reason = self
            .error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Embedding generation was rejected".to_string());
        Err(ApiError::Application(reason))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    pub alias: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicLoading {
    pub enabled: bool,
    pub unload_timeout_minutes: Option<f64>,
    pub model_status: String,
    pub model_last_used: Option<f64>,
    pub timer_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStatistics {
    pub total_images: u64,
    pub visible_images: u64,
    pub hidden_images: u64,
    pub total_documents: u64,
    pub visible_documents: u64,
    pub hidden_documents: u64,
    pub linked_documents: u64,
    pub unlinked_documents: u64,
    pub watched_folders: u64,
    pub watched_folder_paths: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSchedule {
    pub schedule_type: String,
    pub start_hour: u32,
    pub interval_hours: u32,
    pub scheduler_running: bool,
    pub current_model: String,
    pub description: Option<String>,
}

/// Aggregate payload of `GET /api/status` shown in the debug panel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStatus {
    pub status: String,
    pub app_name: Option<String>,
    pub version: Option<String>,
    pub redis_connected: bool,
    pub model: ModelInfo,
    pub dynamic_loading: Option<DynamicLoading>,
    pub statistics: ServerStatistics,
    pub embedding_schedule: EmbeddingSchedule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageInfo {
    pub hash: String,
    pub url: String,
    pub local_path: String,
    pub extension: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedDocument {
    pub title: String,
    pub content: String,
    pub url: String,
    pub date: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDetails {
    pub image: ImageInfo,
    pub documents: Vec<LinkedDocument>,
}

/// Client-local flags; never sent over the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// The caller reports failures itself, so the toast layer stays quiet
    pub skip_notification: bool,
}

impl RequestOptions {
    pub fn quiet() -> Self {
        Self {
            skip_notification: true,
        }
    }
}

/// Backend error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Model was not ready after {polls} status checks")]
    Timeout { polls: u32 },

    #[error("{0}")]
    Application(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Request superseded by a newer one")]
    Cancelled,
}

impl ApiError {
    /// Returns true if repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout { .. } => true,
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
