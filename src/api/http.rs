// src/api/http.rs
// reqwest implementation of the backend API

use super::types::{LoadingNotice, RawSearchStatus};
use super::{
    ApiError, GenerateResponse, ImageDetails, ModelInfo, ProgressSnapshot, ReadinessStatus,
    SearchBackend, SearchKind, SearchOutcome, SearchRequest, SearchResponse, ServerStatus,
    MODEL_LOADING_MARKER,
};
use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::{Client, IntoUrl, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct HttpBackend {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("HTTP backend initialized for {}", base_url);

        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/image/{hash}/details` with the hash escaped as one path segment
    fn details_url(&self, hash: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.url("/api/image"))
            .map_err(|e| ApiError::Network(format!("Invalid server URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("Invalid server URL: {}", self.base_url)))?
            .push(hash)
            .push("details");
        Ok(url)
    }

    async fn get(&self, path: &str) -> Result<(u16, String), ApiError> {
        self.get_url(self.url(path)).await
    }

    async fn get_url<U: IntoUrl>(&self, url: U) -> Result<(u16, String), ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_send_error)?;
        read_body(response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(u16, String), ApiError> {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(map_send_error)?;
        read_body(response).await
    }
}

async fn read_body(response: Response) -> Result<(u16, String), ApiError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Network(format!("Failed to read response body: {}", e)))?;
    Ok((status, body))
}

fn map_send_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Network(format!("Request timed out: {}", err))
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Pull the `error` field out of a JSON body, if there is one
fn error_field(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Non-2xx becomes `Http`; a 2xx body carrying `error` becomes `Application`.
pub(crate) fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    if !is_success(status) {
        let message = error_field(body).unwrap_or_else(|| body.trim().to_string());
        return Err(ApiError::Http { status, message });
    }

    if let Some(message) = error_field(body) {
        return Err(ApiError::Application(message));
    }

    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// A `202` with the loading marker means "not ready yet", not a failure
pub(crate) fn classify_search(status: u16, body: &str) -> Result<SearchOutcome, ApiError> {
    if status == 202 {
        if let Ok(notice) = serde_json::from_str::<LoadingNotice>(body) {
            if notice.status == MODEL_LOADING_MARKER {
                return Ok(SearchOutcome::ModelLoading {
                    message: notice.message,
                });
            }
        }
    }

    decode_body::<SearchResponse>(status, body).map(SearchOutcome::Results)
}

pub(crate) fn parse_readiness(status: u16, body: &str) -> Result<ReadinessStatus, ApiError> {
    decode_body::<RawSearchStatus>(status, body).map(ReadinessStatus::from)
}

pub(crate) fn parse_progress(status: u16, body: &str) -> Result<ProgressSnapshot, ApiError> {
    decode_body::<ProgressSnapshot>(status, body).map(ProgressSnapshot::normalized)
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search_status(&self) -> Result<ReadinessStatus, ApiError> {
        let (status, body) = self.get("/api/search/status").await?;
        parse_readiness(status, &body)
    }

    async fn search(
        &self,
        kind: SearchKind,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, ApiError> {
        tracing::debug!(
            "POST {} query='{}' max_results={}",
            kind.path(),
            request.query,
            request.max_results
        );
        let (status, body) = self.post(kind.path(), Some(request)).await?;
        classify_search(status, &body)
    }

    async fn embedding_progress(&self) -> Result<ProgressSnapshot, ApiError> {
        let (status, body) = self.get("/api/embeddings/progress").await?;
        parse_progress(status, &body)
    }

    async fn generate_embeddings(&self) -> Result<GenerateResponse, ApiError> {
        let (status, body) = self
            .post::<Value>("/api/embeddings/generate", None)
            .await?;
        if !is_success(status) {
            return decode_body(status, &body);
        }
        // `{ success: false, error }` is a normal answer here, so skip the error-field check
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn server_status(&self) -> Result<ServerStatus, ApiError> {
        let (status, body) = self.get("/api/status").await?;
        decode_body(status, &body)
    }

    async fn image_details(&self, hash: &str) -> Result<ImageDetails, ApiError> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(ApiError::Application("Image hash is required".to_string()));
        }
        let url = self.details_url(hash)?;
        let (status, body) = self.get_url(url).await?;
        decode_body(status, &body)
    }

    async fn load_model(&self) -> Result<String, ApiError> {
        let (status, body) = self.post::<Value>("/api/model/load", None).await?;
        decode_body::<MessageBody>(status, &body).map(|b| b.message)
    }

    async fn unload_model(&self) -> Result<String, ApiError> {
        let (status, body) = self.post::<Value>("/api/model/unload", None).await?;
        decode_body::<MessageBody>(status, &body).map(|b| b.message)
    }

    async fn model_status(&self) -> Result<ModelInfo, ApiError> {
        let (status, body) = self.get("/api/model/status").await?;
        decode_body(status, &body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ModelState;

    #[test]
    fn loading_marker_in_202_is_not_an_error() {
        let body = r#"{"status":"model_loading","message":"Model 'clip' is currently loading"}"#;
        assert_eq!(
            classify_search(202, body),
            Ok(SearchOutcome::ModelLoading {
                message: "Model 'clip' is currently loading".to_string()
            })
        );
    }

    #[test]
    fn results_body_is_decoded() {
        let body = r#"{"query":"dogs","results":[{"hash":"a"},{"hash":"b"}],"total":2}"#;
        match classify_search(200, body) {
            Ok(SearchOutcome::Results(response)) => {
                assert_eq!(response.total, 2);
                assert_eq!(response.results.len(), 2);
                assert!(response.warning.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn fallback_warning_is_kept() {
        let body = r#"{"results":[],"total":0,"search_type":"image_fallback",
            "warning":{"type":"hybrid_search_fallback","message":"Hybrid search unavailable"}}"#;
        let Ok(SearchOutcome::Results(response)) = classify_search(200, body) else {
            panic!("expected results");
        };
        let warning = response.warning.unwrap();
        assert_eq!(warning.kind, "hybrid_search_fallback");
        assert_eq!(warning.reason, None);
    }

    #[test]
    fn error_statuses_carry_the_server_message() {
        assert_eq!(
            classify_search(503, r#"{"error":"Failed to load model 'clip'"}"#),
            Err(ApiError::Http {
                status: 503,
                message: "Failed to load model 'clip'".to_string()
            })
        );
        assert_eq!(
            classify_search(500, "Internal Server Error"),
            Err(ApiError::Http {
                status: 500,
                message: "Internal Server Error".to_string()
            })
        );
    }

    #[test]
    fn error_field_in_success_body_is_application_error() {
        assert_eq!(
            parse_progress(200, r#"{"error":"Redis not connected"}"#),
            Err(ApiError::Application("Redis not connected".to_string()))
        );
    }

    #[test]
    fn plain_202_without_marker_is_treated_as_results() {
        let outcome = classify_search(202, r#"{"results":[],"total":0}"#).unwrap();
        assert!(matches!(outcome, SearchOutcome::Results(_)));
    }

    #[test]
    fn readiness_is_parsed_from_status_endpoint() {
        let body = r#"{"model_alias":"clip","model_status":"loading","model_status_code":1,
            "ready_for_search":false,"dynamic_loading":{"enabled":true}}"#;
        let status = parse_readiness(200, body).unwrap();
        assert_eq!(status.state, ModelState::Loading);
        assert!(!status.is_ready());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(
            parse_readiness(200, "not json"),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.url("/search"), "http://localhost:5000/search");
    }

    #[test]
    fn image_hash_is_escaped_as_one_segment() {
        let backend = HttpBackend::new("http://localhost:5000", Duration::from_secs(5)).unwrap();

        let url = backend.details_url("a/b?c#d").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/image/a%2Fb%3Fc%23d/details"
        );

        let url = backend.details_url("3f9a01").unwrap();
        assert_eq!(url.path(), "/api/image/3f9a01/details");
    }
}
