//! Tavily search client
//!
//! Requests ask for full page content so section writers get the complete
//! source text, not only the snippet.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{read_json, with_retry, SearchProvider, SearchResponse, SourceDocument};
use super::{DEFAULT_TIMEOUT_SECS, MAX_RETRIES, RETRY_BASE_DELAY};
use crate::error::{ReportError, SearchError};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Results requested per query
const DEFAULT_MAX_RESULTS: u32 = 5;

/// Topic filter for Tavily API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// General web search
    #[default]
    General,
    /// Recent news articles
    News,
}

/// Tavily Search API client
pub struct TavilyClient {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    max_results: u32,
    topic: Topic,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: RETRY_BASE_DELAY,
            max_results: DEFAULT_MAX_RESULTS,
            topic: Topic::General,
        }
    }

    /// Create from environment variable TAVILY_API_KEY
    pub fn from_env() -> Result<Self, ReportError> {
        match std::env::var("TAVILY_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Self::new(key)),
            _ => Err(ReportError::config("TAVILY_API_KEY environment variable not set")),
        }
    }

    /// Point the client at a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = topic;
        self
    }

    fn request_for(&self, query: &str) -> TavilyRequest {
        TavilyRequest {
            query: query.to_string(),
            max_results: self.max_results,
            topic: self.topic,
            include_answer: false,
            include_raw_content: true,
        }
    }

    async fn execute_single_request(&self, request: &TavilyRequest) -> Result<TavilyResponse, SearchError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(SearchError::from_transport)?;

        read_json(response).await
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let request = self.request_for(query);
        debug!(query = %query, max_results = self.max_results, "Executing Tavily search");

        let response = with_retry("tavily", self.max_retries, self.retry_base_delay, || {
            self.execute_single_request(&request)
        })
        .await?;

        Ok(SearchResponse {
            query: query.to_string(),
            results: response.results.into_iter().map(SourceDocument::from).collect(),
        })
    }

    fn name(&self) -> &str {
        "tavily"
    }

    fn includes_raw_content(&self) -> bool {
        true
    }
}

/// Request body for Tavily API
#[derive(Debug, Serialize)]
struct TavilyRequest {
    query: String,
    max_results: u32,
    topic: Topic,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
    raw_content: Option<String>,
}

impl From<TavilyResult> for SourceDocument {
    fn from(r: TavilyResult) -> Self {
        SourceDocument {
            title: r.title,
            url: r.url,
            content: r.content,
            raw_content: r.raw_content,
            score: r.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_client(server: &MockServer) -> TavilyClient {
        TavilyClient::new("test-api-key")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0)
            .with_retry_base_delay(Duration::from_millis(10))
    }

    fn sample_success_response() -> serde_json::Value {
        serde_json::json!({
            "answer": null,
            "results": [
                {
                    "title": "Rust Programming Language",
                    "url": "https://rust-lang.org",
                    "content": "Rust is a systems programming language focused on safety.",
                    "score": 0.95,
                    "raw_content": "Rust empowers everyone to build reliable software."
                },
                {
                    "title": "Learn Rust",
                    "url": "https://doc.rust-lang.org/book/",
                    "content": "The Rust Programming Language book.",
                    "score": 0.88,
                    "raw_content": null
                }
            ]
        })
    }

    #[test]
    fn test_request_defaults() {
        let client = TavilyClient::new("key");
        let json = serde_json::to_value(client.request_for("rust")).unwrap();

        assert_eq!(json["max_results"], 5);
        assert_eq!(json["topic"], "general");
        assert_eq!(json["include_raw_content"], true);
        assert!(client.includes_raw_content());
    }

    #[test]
    fn test_from_env_missing_key() {
        std::env::remove_var("TAVILY_API_KEY");
        assert!(matches!(TavilyClient::from_env(), Err(ReportError::Config(_))));
    }

    #[tokio::test]
    async fn test_http_successful_search() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_partial_json(serde_json::json!({"query": "Rust programming"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_success_response()))
            .mount(&mock_server)
            .await;

        let response = mock_client(&mock_server).search("Rust programming").await.unwrap();

        assert_eq!(response.query, "Rust programming");
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].title, "Rust Programming Language");
        assert!(response.results[0].raw_content.is_some());
        assert!(response.results[1].raw_content.is_none());
    }

    #[tokio::test]
    async fn test_http_unauthorized_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = mock_client(&mock_server).with_max_retries(3).search("test").await;
        assert!(matches!(result, Err(SearchError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_http_retry_on_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal server error"))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_success_response()))
            .mount(&mock_server)
            .await;

        let response = mock_client(&mock_server).with_max_retries(3).search("test").await.unwrap();
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn test_http_retries_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let result = mock_client(&mock_server).with_max_retries(2).search("test").await;
        assert!(matches!(result, Err(SearchError::ServerError(503, _))));
    }

    #[tokio::test]
    async fn test_http_malformed_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let result = mock_client(&mock_server).search("test").await;
        assert!(matches!(result, Err(SearchError::ParseError(_))));
    }
}
