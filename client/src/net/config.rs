//! Trace API configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use reqwest::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CATALOG_LIMIT: usize = 100;

/// Errors produced while building API configuration or the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The base URL is not an absolute `http`/`https` URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeouts: ApiTimeouts,
    pub catalog_limit: usize,
}

impl ApiConfig {
    /// Config pointing at `base_url` with default timeouts and limit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for non-HTTP or relative URLs.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            api_token: None,
            timeouts: ApiTimeouts::default(),
            catalog_limit: DEFAULT_CATALOG_LIMIT,
        })
    }

    /// Build typed API config from environment variables.
    ///
    /// Optional:
    /// - `TRACELENS_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `TRACELENS_API_TOKEN`: bearer token sent with every request
    /// - `TRACELENS_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TRACELENS_CONNECT_TIMEOUT_SECS`: default 10
    /// - `TRACELENS_CATALOG_LIMIT`: default 100
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when the base URL is unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when the base URL is unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("TRACELENS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let api_token = lookup("TRACELENS_API_TOKEN").filter(|token| !token.trim().is_empty());
        let timeouts = ApiTimeouts {
            request_secs: parse_or(&lookup, "TRACELENS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(&lookup, "TRACELENS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let catalog_limit = parse_or(&lookup, "TRACELENS_CATALOG_LIMIT", DEFAULT_CATALOG_LIMIT);

        Ok(Self {
            base_url: normalize_base_url(&base_url)?,
            api_token,
            timeouts,
            catalog_limit,
        })
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}
