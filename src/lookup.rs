//! External lookup abstraction and concrete HTTP clients.
//!
//! Every stage that consults an outside service does so through [`Lookup`]:
//! one query string in, one raw JSON value out. The orchestration core is
//! agnostic to which concrete service backs each adapter, and tests swap in
//! canned-response mocks.
//!
//! Clients make a single attempt per call and classify the outcome:
//!
//! - network error, HTTP 429, or 5xx → [`LookupError::Transient`]
//!   (retryable; the executor's retry policy decides whether to try again)
//! - HTTP 404 → [`LookupError::NotFound`]
//! - any other 4xx, or an unparseable body → [`LookupError::Internal`]
//!
//! Each call's connection is scoped to the request future; cancelling the
//! stage (deadline expiry) drops the future and releases the connection.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::{CitationsConfig, FactcheckConfig, SummarizerConfig};
use crate::error::StageError;

/// Failure modes of a single lookup call.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("transient lookup failure: {0}")]
    Transient(String),
    #[error("no result: {0}")]
    NotFound(String),
    #[error("lookup rejected: {0}")]
    Internal(String),
}

impl From<LookupError> for StageError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Transient(msg) => StageError::transient(msg),
            LookupError::NotFound(msg) => StageError::not_found(msg),
            LookupError::Internal(msg) => StageError::internal(msg),
        }
    }
}

/// Minimal contract for an external verification/inference service.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Service label used in warnings and error messages.
    fn service_name(&self) -> &str;

    /// Submit one query and return the service's raw JSON response.
    async fn lookup(&self, query: &str) -> Result<Value, LookupError>;
}

/// Map a completed HTTP response to the lookup taxonomy.
async fn classify_response(
    service: &str,
    response: reqwest::Response,
) -> Result<Value, LookupError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<Value>()
            .await
            .map_err(|e| LookupError::Internal(format!("{service}: invalid JSON body: {e}")));
    }
    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 404 {
        return Err(LookupError::NotFound(format!("{service}: {status}")));
    }
    if status.as_u16() == 429 || status.is_server_error() {
        return Err(LookupError::Transient(format!(
            "{service}: {status}: {body}"
        )));
    }
    Err(LookupError::Internal(format!("{service}: {status}: {body}")))
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LookupError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LookupError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Cap a query at `max_chars` characters. Queries come from free-form
/// document text, so the cut must land on a char boundary, never a byte
/// offset.
fn truncate_query(query: &str, max_chars: usize) -> String {
    query.chars().take(max_chars).collect()
}

// ============ Citation resolver (CrossRef) ============

/// Resolves a citation title against the CrossRef works endpoint.
pub struct CrossRefLookup {
    client: reqwest::Client,
    endpoint: String,
    user_agent: String,
}

impl CrossRefLookup {
    pub fn new(config: &CitationsConfig) -> anyhow::Result<Self> {
        let user_agent = match &config.mailto {
            Some(mailto) => format!("paperlens/0.1 (mailto:{mailto})"),
            None => "paperlens/0.1".to_string(),
        };
        Ok(Self {
            client: http_client(config.request_timeout_secs)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?,
            endpoint: config.endpoint.clone(),
            user_agent,
        })
    }
}

#[async_trait]
impl Lookup for CrossRefLookup {
    fn service_name(&self) -> &str {
        "crossref"
    }

    async fn lookup(&self, query: &str) -> Result<Value, LookupError> {
        let query = truncate_query(query, 200);
        let response = self
            .client
            .get(&self.endpoint)
            .header("User-Agent", &self.user_agent)
            .query(&[
                ("query", query.as_str()),
                ("rows", "1"),
                ("select", "title,DOI"),
            ])
            .send()
            .await
            .map_err(|e| LookupError::Transient(format!("crossref: {e}")))?;
        classify_response(self.service_name(), response).await
    }
}

// ============ Fact-check resolver (Google Fact Check Tools) ============

/// Searches published claim reviews for a candidate claim.
pub struct FactCheckLookup {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl FactCheckLookup {
    pub fn new(config: &FactcheckConfig, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(config.request_timeout_secs)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Lookup for FactCheckLookup {
    fn service_name(&self) -> &str {
        "factcheck"
    }

    async fn lookup(&self, query: &str) -> Result<Value, LookupError> {
        let query = truncate_query(query, 500);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("query", query.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LookupError::Transient(format!("factcheck: {e}")))?;
        classify_response(self.service_name(), response).await
    }
}

// ============ Remote summarization backend ============

/// Calls a hosted summarization model (HF-inference request shape:
/// `{"inputs": …}` in, `[{"summary_text": …}]` out).
pub struct RemoteSummaryLookup {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl RemoteSummaryLookup {
    pub fn new(config: &SummarizerConfig, endpoint: String) -> anyhow::Result<Self> {
        let bearer_token = std::env::var(&config.api_key_env).ok().filter(|t| !t.is_empty());
        Ok(Self {
            client: http_client(config.request_timeout_secs)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?,
            endpoint,
            bearer_token,
        })
    }
}

#[async_trait]
impl Lookup for RemoteSummaryLookup {
    fn service_name(&self) -> &str {
        "summarizer"
    }

    async fn lookup(&self, query: &str) -> Result<Value, LookupError> {
        let body = serde_json::json!({
            "inputs": query,
            "parameters": { "max_length": 300, "min_length": 100, "do_sample": false },
        });
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Transient(format!("summarizer: {e}")))?;
        classify_response(self.service_name(), response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_chars_not_bytes() {
        // Multibyte text: 300 two-byte chars would straddle any byte cut.
        let query: String = "é".repeat(300);
        let truncated = truncate_query(&query, 200);
        assert_eq!(truncated.chars().count(), 200);
    }

    #[test]
    fn truncation_is_noop_below_the_cap() {
        assert_eq!(truncate_query("short query", 200), "short query");
    }
}
