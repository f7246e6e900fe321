//! Web search providers and source normalization
//!
//! Every provider maps its native response into `SourceDocument`s. Query
//! execution is fail-soft: a failed query contributes an empty result list.

mod perplexity;
mod sources;
mod tavily;

pub use perplexity::PerplexityClient;
pub use sources::{deduplicate_and_format_sources, SourceBudget};
pub use tavily::{TavilyClient, Topic};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{ReportError, SearchError};

/// Default timeout for search API requests
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient failures
pub(crate) const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff
pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// A normalized search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    pub title: String,
    pub url: String,
    /// Most relevant snippet
    pub content: String,
    /// Full page content, when the provider returns it
    #[serde(default)]
    pub raw_content: Option<String>,
    /// Relevance score (0-1)
    #[serde(default)]
    pub score: f64,
}

/// Results for a single query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SourceDocument>,
}

impl SearchResponse {
    /// A response with no results
    pub fn empty(query: impl Into<String>) -> Self {
        Self { query: query.into(), results: Vec::new() }
    }
}

/// Search provider contract
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query against the provider
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Whether results carry full page content worth passing to writers
    fn includes_raw_content(&self) -> bool {
        false
    }
}

/// Supported search backends
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchApi {
    #[default]
    Tavily,
    Perplexity,
}

impl SearchApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchApi::Tavily => "tavily",
            SearchApi::Perplexity => "perplexity",
        }
    }

    /// Build the client for this backend.
    ///
    /// With no explicit key the provider's environment variable is used
    /// (`TAVILY_API_KEY` / `PERPLEXITY_API_KEY`).
    pub fn client(&self, api_key: Option<String>) -> Result<Arc<dyn SearchProvider>, ReportError> {
        let provider: Arc<dyn SearchProvider> = match (self, api_key) {
            (SearchApi::Tavily, Some(key)) => Arc::new(TavilyClient::new(key)),
            (SearchApi::Tavily, None) => Arc::new(TavilyClient::from_env()?),
            (SearchApi::Perplexity, Some(key)) => Arc::new(PerplexityClient::new(key)),
            (SearchApi::Perplexity, None) => Arc::new(PerplexityClient::from_env()?),
        };
        Ok(provider)
    }
}

impl fmt::Display for SearchApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchApi {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(SearchApi::Tavily),
            "perplexity" => Ok(SearchApi::Perplexity),
            other => Err(ReportError::config(format!("Unsupported search API: {}", other))),
        }
    }
}

/// Run every query concurrently.
///
/// Output order matches input order. Provider errors are logged and turned
/// into empty result lists so one failed query never aborts the step.
pub async fn execute_queries(provider: &dyn SearchProvider, queries: &[String]) -> Vec<SearchResponse> {
    let searches = queries.iter().map(|query| async move {
        match provider.search(query).await {
            Ok(response) => response,
            Err(e) => {
                error!(provider = provider.name(), query = %query, error = %e, "Search failed");
                SearchResponse::empty(query.as_str())
            }
        }
    });

    join_all(searches).await
}

/// Execute an HTTP operation with exponential backoff on retryable errors
pub(crate) async fn with_retry<T, F, Fut>(
    provider: &str,
    max_retries: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut last_error = SearchError::Unknown("No attempts made".to_string());

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = base_delay * 2u32.pow(attempt - 1);
            debug!(provider, attempt, delay_ms = delay.as_millis() as u64, "Retrying search request");
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }
                warn!(provider, attempt, error = %e, "Search request failed, will retry");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Turn a response into `T`, mapping HTTP status codes to typed errors
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SearchError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(SearchError::from_status(status.as_u16(), body))
}
