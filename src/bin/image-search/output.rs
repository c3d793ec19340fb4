//! Terminal rendering of session events and command results.
//!
//! Results go to stdout (human-readable or JSON); live events such as
//! loading progress go to stderr so piping JSON output stays clean.

use image_search_client::api::{
    ImageDetails, ModelInfo, ProgressSnapshot, SearchResponse, ServerStatus,
};
use image_search_client::session::{ToastLevel, UiEvent};
use serde::Serialize;
use serde_json::Value;

const CONTENT_MAX_LEN: usize = 160;

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// One line for stderr, or None when the event is reported elsewhere
pub fn format_event(event: &UiEvent, json: bool) -> Option<String> {
    if json {
        return serde_json::to_string(event).ok();
    }

    match event {
        UiEvent::SearchStarted { query, kind } => {
            Some(format!("Searching ({}) for \"{}\"...", kind.as_str(), query))
        }
        UiEvent::LoadingProgress { text } => Some(format!("  {}", text)),
        UiEvent::Progress { snapshot } => Some(format_progress_line(snapshot)),
        UiEvent::ProgressCompleted { snapshot } => Some(format!(
            "Done in {:.1}s: {} processed, {} skipped, {} errors",
            snapshot.elapsed_seconds,
            snapshot.processed_count,
            snapshot.skipped_count,
            snapshot.error_count
        )),
        UiEvent::StatsError { message } => Some(format!("Status refresh failed: {}", message)),
        // errors are reported once, by the command result
        UiEvent::Toast { toast } if toast.level == ToastLevel::Error => None,
        UiEvent::Toast { toast } => Some(format!("[{}] {}", level_label(toast.level), toast.message)),
        UiEvent::SearchCompleted { .. } | UiEvent::SearchFailed { .. } | UiEvent::Stats { .. } => {
            None
        }
    }
}

fn level_label(level: ToastLevel) -> &'static str {
    match level {
        ToastLevel::Info => "info",
        ToastLevel::Success => "ok",
        ToastLevel::Warning => "warn",
        ToastLevel::Error => "error",
    }
}

pub fn format_progress_line(snapshot: &ProgressSnapshot) -> String {
    if !snapshot.active {
        return "No embedding job running".to_string();
    }
    format!(
        "{}: {}/{} ({:.1}%) processed={} skipped={} errors={}",
        if snapshot.stage.is_empty() {
            "Running"
        } else {
            snapshot.stage.as_str()
        },
        snapshot.current,
        snapshot.total,
        snapshot.percentage,
        snapshot.processed_count,
        snapshot.skipped_count,
        snapshot.error_count
    )
}

fn field(result: &Value, key: &str) -> Option<String> {
    match result.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn format_search(response: &SearchResponse) -> String {
    let query = response.query.as_deref().unwrap_or("");
    if response.results.is_empty() {
        return format!("No results found for \"{}\"", query);
    }

    let mut output = String::new();
    output.push_str(&format!(
        "Found {} image{} for \"{}\"",
        response.total,
        if response.total == 1 { "" } else { "s" },
        query
    ));
    if let Some(model) = &response.model {
        output.push_str(&format!(" (model: {})", model));
    }
    output.push_str(":\n\n");

    for (i, result) in response.results.iter().enumerate() {
        let hash = field(result, "hash").unwrap_or_else(|| "?".to_string());
        match field(result, "score") {
            Some(score) => output.push_str(&format!("{}. {} (score: {})\n", i + 1, hash, score)),
            None => output.push_str(&format!("{}. {}\n", i + 1, hash)),
        }
        if let Some(url) = field(result, "url") {
            output.push_str(&format!("   {}\n", url));
        }
    }

    output.trim_end().to_string()
}

pub fn format_status(status: &ServerStatus) -> String {
    let stats = &status.statistics;
    let mut lines = vec![
        format!(
            "{} {} [{}]",
            status.app_name.as_deref().unwrap_or("server"),
            status.version.as_deref().unwrap_or(""),
            status.status
        ),
        format!(
            "Model: {} ({})",
            status.model.alias,
            status.model.status
        ),
        format!(
            "Images: {} ({} visible, {} hidden)",
            stats.total_images, stats.visible_images, stats.hidden_images
        ),
        format!(
            "Documents: {} ({} linked, {} unlinked)",
            stats.total_documents, stats.linked_documents, stats.unlinked_documents
        ),
        format!("Watched folders: {}", stats.watched_folders),
    ];

    if let Some(dynamic) = &status.dynamic_loading {
        if dynamic.enabled {
            lines.push(format!(
                "Dynamic loading: on, unload after {} min",
                dynamic
                    .unload_timeout_minutes
                    .map(|m| format!("{:.0}", m))
                    .unwrap_or_else(|| "?".to_string())
            ));
        }
    }

    let schedule = &status.embedding_schedule;
    if let Some(description) = &schedule.description {
        lines.push(format!("Schedule: {}", description));
    }
    lines.push(format!(
        "Redis: {}",
        if status.redis_connected {
            "connected"
        } else {
            "disconnected"
        }
    ));

    lines.join("\n")
}

pub fn format_details(details: &ImageDetails) -> String {
    let image = &details.image;
    let mut output = format!("Image {}\n", image.hash);
    if !image.url.is_empty() {
        output.push_str(&format!("  url: {}\n", image.url));
    }
    if !image.local_path.is_empty() {
        output.push_str(&format!("  path: {}\n", image.local_path));
    }

    if details.documents.is_empty() {
        output.push_str("No linked documents");
        return output;
    }

    output.push_str(&format!("{} linked document(s):\n", details.documents.len()));
    for doc in &details.documents {
        output.push_str(&format!("- {} ({})\n", doc.title, doc.date));
        if !doc.content.is_empty() {
            output.push_str(&format!("  {}\n", truncate_text(&doc.content, CONTENT_MAX_LEN)));
        }
    }
    output.trim_end().to_string()
}

pub fn format_model(info: &ModelInfo) -> String {
    format!("{}: {}", info.alias, info.status)
}

/// Truncates text to a maximum length, adding ellipsis if needed.
fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_len).collect();
    match truncated.rfind(' ') {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_search_client::session::Toast;
    use serde_json::json;

    #[test]
    fn search_lists_hashes_and_scores() {
        let response = SearchResponse {
            query: Some("dogs".to_string()),
            model: Some("clip".to_string()),
            results: vec![
                json!({"id": "image:a1", "hash": "a1", "score": "0.91"}),
                json!({"hash": "b2"}),
            ],
            total: 2,
            ..Default::default()
        };

        let text = format_search(&response);
        assert!(text.starts_with("Found 2 images for \"dogs\" (model: clip)"));
        assert!(text.contains("1. a1 (score: 0.91)"));
        assert!(text.contains("2. b2"));
    }

    #[test]
    fn empty_search_says_so() {
        let response = SearchResponse {
            query: Some("nothing".to_string()),
            ..Default::default()
        };
        assert_eq!(format_search(&response), "No results found for \"nothing\"");
    }

    #[test]
    fn error_toasts_are_not_echoed() {
        let error = UiEvent::Toast {
            toast: Toast::error("boom"),
        };
        assert!(format_event(&error, false).is_none());

        let info = UiEvent::Toast {
            toast: Toast::info("started"),
        };
        assert_eq!(format_event(&info, false).unwrap(), "[info] started");
    }

    #[test]
    fn json_events_are_tagged() {
        let event = UiEvent::LoadingProgress {
            text: "Model 'clip' is loading... (2s)".to_string(),
        };
        let line = format_event(&event, true).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "loading_progress");
    }

    #[test]
    fn truncation_stops_at_word_boundary() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("hello brave new world", 12), "hello brave...");
    }
}
