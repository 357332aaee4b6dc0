//! HTTP implementation of [`TraceApi`].
//!
//! Thin reqwest wrapper. Endpoints:
//! - `GET {base}/api/traces?limit=&status=`: array, or object with `traces`
//! - `GET {base}/api/traces/{id}`
//! - `GET {base}/api/traces/stats?days=`

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use spans::{TraceDetail, TraceSummary, TracingStats};

use super::api::{FetchError, ListFilters, TraceApi};
use super::config::{ApiConfig, ConfigError};

pub struct HttpTraceApi {
    http: reqwest::Client,
    base: Url,
    api_token: Option<String>,
}

impl HttpTraceApi {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for an unusable base URL and
    /// [`ConfigError::HttpClientBuild`] if reqwest cannot build the client.
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl(config.base_url.clone()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ConfigError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)], resource: &str) -> Result<Value, FetchError> {
        let mut request = self.http.get(url).query(query);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| request_error(&e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| request_error(&e))?;

        if !(200..300).contains(&status) {
            tracing::warn!(%resource, status, "trace API returned error status");
            return Err(FetchError::from_status(status, text, resource));
        }

        spans::parse_json(text.as_bytes()).map_err(|e| FetchError::Parse(format!("{resource}: {e}")))
    }
}

#[async_trait::async_trait]
impl TraceApi for HttpTraceApi {
    async fn list_traces(&self, filters: &ListFilters) -> Result<Vec<TraceSummary>, FetchError> {
        let url = self.endpoint(&["api", "traces"]);
        let body = self.get_json(url, &filters.query_pairs(), "trace catalog").await?;
        parse_catalog(body)
    }

    async fn get_trace(&self, trace_id: &str) -> Result<TraceDetail, FetchError> {
        let url = self.endpoint(&["api", "traces", trace_id]);
        let resource = format!("trace {trace_id}");
        let body = self.get_json(url, &[], &resource).await?;
        TraceDetail::from_json(body).map_err(|e| FetchError::Parse(format!("{resource}: {e}")))
    }

    async fn get_tracing_stats(&self, window_days: u32) -> Result<TracingStats, FetchError> {
        let url = self.endpoint(&["api", "traces", "stats"]);
        let body = self
            .get_json(url, &[("days", window_days.to_string())], "tracing stats")
            .await?;
        serde_json::from_value(body).map_err(|e| FetchError::Parse(format!("tracing stats: {e}")))
    }
}

/// Catalog bodies are a bare array or wrapped as `{ "traces": [...] }`.
/// Non-object entries are skipped.
pub(crate) fn parse_catalog(body: Value) -> Result<Vec<TraceSummary>, FetchError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("traces") {
            Some(Value::Array(items)) => items,
            _ => return Err(FetchError::Parse("trace catalog: missing `traces` array".to_owned())),
        },
        _ => return Err(FetchError::Parse("trace catalog: expected array".to_owned())),
    };

    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value::<TraceSummary>(item).ok())
        .collect())
}

fn request_error(error: &reqwest::Error) -> FetchError {
    if error.is_decode() {
        FetchError::Parse(error.to_string())
    } else {
        FetchError::Transient(error.to_string())
    }
}
