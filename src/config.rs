use crate::error::AppError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
pub const DEFAULT_USER_NAME: &str = "Jaswanth";
pub const DEFAULT_USER_ROLE: &str = "Portfolio Manager";
pub const DEFAULT_THEME: &str = "dark";
pub const DEFAULT_STATUS_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_QUOTE_POLL_INTERVAL_MS: u64 = 30_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 500;
pub const MAX_POLL_INTERVAL_MS: u64 = 600_000;

const API_URL_ENV: &str = "MARKETPULSE_API_URL";
const WS_URL_ENV: &str = "MARKETPULSE_WS_URL";

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn resolve_api_url() -> String {
    env_override(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

pub fn resolve_ws_url() -> String {
    env_override(WS_URL_ENV).unwrap_or_else(|| DEFAULT_WS_URL.to_string())
}

/// Caller-facing knobs, all optional. `normalize` fills env/default fallbacks
/// and validates before anything async starts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeArgs {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub user_name: Option<String>,
    pub status_poll_interval_ms: Option<u64>,
    pub quote_poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub api_url: String,
    pub ws_url: String,
    pub user_name: String,
    pub status_poll_interval_ms: u64,
    pub quote_poll_interval_ms: u64,
}

impl RuntimeArgs {
    pub fn normalize(self) -> Result<RuntimeConfig, AppError> {
        let api_url = self
            .api_url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(resolve_api_url);
        let api_url = api_url.trim_end_matches('/').to_string();

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(AppError::InvalidArgument(
                "apiUrl must start with http:// or https://".to_string(),
            ));
        }

        let ws_url = self
            .ws_url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(resolve_ws_url);

        if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
            return Err(AppError::InvalidArgument(
                "wsUrl must start with ws:// or wss://".to_string(),
            ));
        }

        let user_name = self
            .user_name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());

        let status_poll_interval_ms = self
            .status_poll_interval_ms
            .unwrap_or(DEFAULT_STATUS_POLL_INTERVAL_MS);
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&status_poll_interval_ms) {
            return Err(AppError::InvalidArgument(format!(
                "statusPollIntervalMs must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
            )));
        }

        let quote_poll_interval_ms = self
            .quote_poll_interval_ms
            .unwrap_or(DEFAULT_QUOTE_POLL_INTERVAL_MS);
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&quote_poll_interval_ms) {
            return Err(AppError::InvalidArgument(format!(
                "quotePollIntervalMs must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
            )));
        }

        Ok(RuntimeConfig {
            api_url,
            ws_url,
            user_name,
            status_poll_interval_ms,
            quote_poll_interval_ms,
        })
    }
}
