use crate::api::{normalize_max_results, DEFAULT_HYBRID_FUNCTION, DEFAULT_MAX_RESULTS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "image-search.json";
const MIN_INTERVAL_MS: u64 = 100;
const MAX_STATUS_POLLS_LIMIT: u32 = 3600;

pub const CONFIG_PATH_ENV: &str = "IMAGE_SEARCH_CONFIG";
pub const URL_ENV: &str = "IMAGE_SEARCH_URL";
pub const TIMEOUT_ENV: &str = "IMAGE_SEARCH_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATUS_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_STATUS_POLLS: u32 = 60;
pub const DEFAULT_PROGRESS_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_BACKGROUND_CHECK_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_STATS_REFRESH_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub status_poll_interval_ms: u64,
    /// Readiness checks a gated search waits through before timing out
    pub max_status_polls: u32,
    pub progress_poll_interval_ms: u64,
    pub background_check_interval_ms: u64,
    pub stats_refresh_interval_ms: u64,
    pub max_results: u32,
    pub hybrid_function: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            status_poll_interval_ms: DEFAULT_STATUS_POLL_INTERVAL_MS,
            max_status_polls: DEFAULT_MAX_STATUS_POLLS,
            progress_poll_interval_ms: DEFAULT_PROGRESS_POLL_INTERVAL_MS,
            background_check_interval_ms: DEFAULT_BACKGROUND_CHECK_INTERVAL_MS,
            stats_refresh_interval_ms: DEFAULT_STATS_REFRESH_INTERVAL_MS,
            max_results: DEFAULT_MAX_RESULTS,
            hybrid_function: DEFAULT_HYBRID_FUNCTION,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_interval_ms)
    }

    pub fn background_check_interval(&self) -> Duration {
        Duration::from_millis(self.background_check_interval_ms)
    }

    pub fn stats_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.stats_refresh_interval_ms)
    }

    /// Apply overrides from process environment (after `.env` was loaded)
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid {}='{}'", TIMEOUT_ENV, raw),
            }
        }

        normalize_config(self);
    }
}

pub fn normalize_base_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_BASE_URL.to_string();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn normalize_interval(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value.max(MIN_INTERVAL_MS)
    }
}

fn normalize_config(config: &mut ClientConfig) {
    config.base_url = normalize_base_url(&config.base_url);
    if config.request_timeout_secs == 0 {
        config.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
    }
    config.status_poll_interval_ms =
        normalize_interval(config.status_poll_interval_ms, DEFAULT_STATUS_POLL_INTERVAL_MS);
    config.progress_poll_interval_ms = normalize_interval(
        config.progress_poll_interval_ms,
        DEFAULT_PROGRESS_POLL_INTERVAL_MS,
    );
    config.background_check_interval_ms = normalize_interval(
        config.background_check_interval_ms,
        DEFAULT_BACKGROUND_CHECK_INTERVAL_MS,
    );
    config.stats_refresh_interval_ms = normalize_interval(
        config.stats_refresh_interval_ms,
        DEFAULT_STATS_REFRESH_INTERVAL_MS,
    );
    config.max_status_polls = match config.max_status_polls {
        0 => DEFAULT_MAX_STATUS_POLLS,
        n => n.min(MAX_STATUS_POLLS_LIMIT),
    };
    config.max_results = normalize_max_results(config.max_results);
}

/// `$IMAGE_SEARCH_CONFIG`, or `image-search.json` in the working directory
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Read the config file, writing defaults if it does not exist.
/// An unreadable file is kept as `.json.bak` and replaced with defaults.
pub fn load_or_create(path: &Path) -> Result<ClientConfig, String> {
    if !path.exists() {
        let config = ClientConfig::default();
        save(path, &config)?;
        tracing::info!("Created default config at {}", path.display());
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    match serde_json::from_str::<ClientConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!("Config at {} is invalid ({}), resetting", path.display(), e);
            let backup = path.with_extension("json.bak");
            let _ = fs::copy(path, backup);
            let config = ClientConfig::default();
            save(path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(path: &Path, config: &ClientConfig) -> Result<(), String> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to save config: {}", e))
}
