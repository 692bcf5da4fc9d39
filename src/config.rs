use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Lumis";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Releases allowed per local calendar day.
pub const DEFAULT_DAILY_RELEASE_LIMIT: u32 = 5;

/// Longest release text accepted, in characters.
pub const MAX_RELEASE_CHARS: usize = 200;

/// Default chat-completion host (Volcengine Ark, DeepSeek models).
pub const DEFAULT_API_BASE_URL: &str = "https://ark.cn-beijing.volces.com";
pub const DEFAULT_API_ENDPOINT: &str = "/api/v3/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-v3-241226";

/// Per-request timeout for the chat API. Generation can be slow.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 120;

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "lumis_lib=info,warn"
}

/// Get the application data directory
/// ~/Lumis/ on all platforms. Falls back to the working directory when
/// no home directory can be determined (sandboxed shells).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// SQLite file holding diagnoses, cards and the release log.
pub fn database_path() -> PathBuf {
    app_data_dir().join("lumis.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No API key configured (set LUMIS_API_KEY)")]
    MissingApiKey,

    #[error("Invalid API base URL: '{0}'")]
    InvalidBaseUrl(String),

    #[error("Invalid number for {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}

/// Chat API + release settings, resolved from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub daily_release_limit: u32,
}

impl ApiConfig {
    /// Read `LUMIS_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("LUMIS_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let base_url = non_empty("LUMIS_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        let endpoint = non_empty("LUMIS_API_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
        let model = non_empty("LUMIS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = match non_empty("LUMIS_API_TIMEOUT_SECS") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: "LUMIS_API_TIMEOUT_SECS",
                value: v,
            })?,
            None => DEFAULT_API_TIMEOUT_SECS,
        };

        let daily_release_limit = match non_empty("LUMIS_DAILY_LIMIT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: "LUMIS_DAILY_LIMIT",
                value: v,
            })?,
            None => DEFAULT_DAILY_RELEASE_LIMIT,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint,
            api_key,
            model,
            timeout_secs,
            daily_release_limit,
        })
    }
}
