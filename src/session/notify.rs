use crate::api::{ApiError, RequestOptions};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short user-facing notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, message)
    }
}

/// Toast for a failed request, or None when the caller asked to handle it
pub fn toast_for_error(error: &ApiError, options: RequestOptions) -> Option<Toast> {
    if options.skip_notification {
        return None;
    }

    let message = match error {
        ApiError::Network(_) => format!("Cannot reach the search server ({})", error),
        ApiError::Http { status, message } if message.is_empty() => {
            format!("Server returned HTTP {}", status)
        }
        ApiError::Http { message, .. } => message.clone(),
        ApiError::Timeout { .. } => "Timed out waiting for the model to load".to_string(),
        ApiError::Application(message) => message.clone(),
        ApiError::Decode(_) => format!("Unexpected server response ({})", error),
        // superseded requests are not failures
        ApiError::Cancelled => return None,
    };

    Some(Toast::error(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_notification_suppresses_toast() {
        let error = ApiError::Network("connection refused".to_string());
        assert!(toast_for_error(&error, RequestOptions::quiet()).is_none());

        let toast = toast_for_error(&error, RequestOptions::default()).unwrap();
        assert_eq!(toast.level, ToastLevel::Error);
        assert!(toast.message.contains("connection refused"));
    }

    #[test]
    fn http_error_shows_server_message() {
        let error = ApiError::Http {
            status: 404,
            message: "Image not found".to_string(),
        };
        let toast = toast_for_error(&error, RequestOptions::default()).unwrap();
        assert_eq!(toast.message, "Image not found");
    }

    #[test]
    fn cancelled_requests_are_silent() {
        assert!(toast_for_error(&ApiError::Cancelled, RequestOptions::default()).is_none());
    }
}
