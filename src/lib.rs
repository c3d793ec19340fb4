//! Client for an image search server whose model loads on demand.
//!
//! Searches sent while the model is warming up are parked, the server's
//! readiness endpoint is polled, and the request is replayed once the model
//! is ready. Embedding generation progress is followed by a fast poller that
//! a slow background watcher arms when it notices a running job.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod poller;
pub mod session;

pub use api::{ApiError, HttpBackend, SearchBackend, SearchKind, SearchRequest, SearchResponse};
pub use config::ClientConfig;
pub use dispatcher::GatedDispatcher;
pub use poller::{BackgroundWatcher, ProgressPoller, StatusPoller};
pub use session::{SearchSession, UiEvent};
