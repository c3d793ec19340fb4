use super::notify::Toast;
use crate::api::{ProgressSnapshot, SearchKind, SearchResponse, ServerStatus};
use serde::Serialize;

/// Everything a presentation layer needs to render the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    SearchStarted {
        query: String,
        kind: SearchKind,
    },
    /// Model still loading; text is meant for display only
    LoadingProgress {
        text: String,
    },
    SearchCompleted {
        response: SearchResponse,
    },
    SearchFailed {
        message: String,
    },
    Progress {
        snapshot: ProgressSnapshot,
    },
    ProgressCompleted {
        snapshot: ProgressSnapshot,
    },
    Stats {
        status: ServerStatus,
    },
    StatsError {
        message: String,
    },
    Toast {
        toast: Toast,
    },
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::SearchStarted { .. } => "search-started",
            UiEvent::LoadingProgress { .. } => "loading-progress",
            UiEvent::SearchCompleted { .. } => "search-completed",
            UiEvent::SearchFailed { .. } => "search-failed",
            UiEvent::Progress { .. } => "progress",
            UiEvent::ProgressCompleted { .. } => "progress-completed",
            UiEvent::Stats { .. } => "stats",
            UiEvent::StatsError { .. } => "stats-error",
            UiEvent::Toast { .. } => "toast",
        }
    }
}
