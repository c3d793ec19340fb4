// src/api/mod.rs
// Backend API - typed access to the image search server

mod http;
#[cfg(test)]
pub(crate) mod mock;
mod types;

pub use http::HttpBackend;
pub use types::{
    normalize_max_results, ApiError, DynamicLoading, EmbeddingSchedule, GenerateResponse,
    ImageDetails, ImageInfo, LinkedDocument, ModelInfo, ModelState, ProgressSnapshot,
    ReadinessStatus, RequestOptions, SearchKind, SearchOutcome, SearchRequest, SearchResponse,
    SearchWarning, ServerStatistics, ServerStatus, ALLOWED_MAX_RESULTS, DEFAULT_HYBRID_FUNCTION,
    DEFAULT_MAX_RESULTS, MODEL_LOADING_MARKER,
};

use async_trait::async_trait;

/// Everything the client needs from the search server
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// `GET /api/search/status`
    async fn search_status(&self) -> Result<ReadinessStatus, ApiError>;

    /// `POST /search` or `POST /search_complex`
    async fn search(
        &self,
        kind: SearchKind,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, ApiError>;

    /// `GET /api/embeddings/progress`
    async fn embedding_progress(&self) -> Result<ProgressSnapshot, ApiError>;

    /// `POST /api/embeddings/generate`
    async fn generate_embeddings(&self) -> Result<GenerateResponse, ApiError>;

    /// `GET /api/status`
    async fn server_status(&self) -> Result<ServerStatus, ApiError>;

    /// `GET /api/image/{hash}/details`
    async fn image_details(&self, hash: &str) -> Result<ImageDetails, ApiError>;

    /// `POST /api/model/load`, returns the server's message
    async fn load_model(&self) -> Result<String, ApiError>;

    /// `POST /api/model/unload`, returns the server's message
    async fn unload_model(&self) -> Result<String, ApiError>;

    /// `GET /api/model/status`
    async fn model_status(&self) -> Result<ModelInfo, ApiError>;

    /// Backend name for logs
    fn name(&self) -> &str;
}
