//! Read contract with the trace API collaborator.
//!
//! ERROR HANDLING
//! ==============
//! Every call returns [`FetchError`], which keeps "not found" apart from
//! transient failures so views can decide between an empty state and a retry
//! prompt. Nothing here is fatal to the caller.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use spans::{TraceDetail, TraceSummary, TracingStats};

use super::config::DEFAULT_CATALOG_LIMIT;

/// Errors produced while fetching catalog, detail or stats payloads.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network trouble, timeouts, throttling or a server-side failure.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// The API answered with a non-success status that is neither of the above.
    #[error("API response error: status {status}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),
}

impl FetchError {
    /// Classify a non-success HTTP status for `resource`.
    #[must_use]
    pub fn from_status(status: u16, body: String, resource: &str) -> Self {
        match status {
            404 => Self::NotFound(resource.to_owned()),
            408 | 429 | 500..=599 => Self::Transient(format!("{resource}: status {status}")),
            _ => Self::Http { status, body },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Stable machine-readable code plus a retry hint for an error.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    /// Whether re-invoking the same action may succeed.
    fn retryable(&self) -> bool {
        false
    }
}

impl ErrorCode for FetchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Transient(_) => "E_TRANSIENT",
            Self::Http { .. } => "E_HTTP_STATUS",
            Self::Parse(_) => "E_PARSE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Catalog query parameters forwarded to the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListFilters {
    pub limit: usize,
    pub status: Option<String>,
}

impl Default for ListFilters {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CATALOG_LIMIT,
            status: None,
        }
    }
}

impl ListFilters {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, status: None }
    }

    /// Query-string pairs, omitting an empty status.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if let Some(status) = self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("status", status.to_owned()));
        }
        pairs
    }
}

/// Source of trace records. Implementations must be cheap to share across tasks.
#[async_trait::async_trait]
pub trait TraceApi: Send + Sync {
    /// Fetch the trace catalog.
    async fn list_traces(&self, filters: &ListFilters) -> Result<Vec<TraceSummary>, FetchError>;

    /// Fetch one trace including its full span tree.
    async fn get_trace(&self, trace_id: &str) -> Result<TraceDetail, FetchError>;

    /// Fetch headline tracing statistics over the last `window_days` days.
    async fn get_tracing_stats(&self, window_days: u32) -> Result<TracingStats, FetchError>;
}
