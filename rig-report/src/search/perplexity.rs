//! Perplexity search client
//!
//! Perplexity answers with a synthesized text plus a citation list. The
//! answer becomes the primary source (attributed to the first citation) and
//! every further citation becomes a secondary source without content.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{read_json, with_retry, SearchProvider, SearchResponse, SourceDocument};
use super::{DEFAULT_TIMEOUT_SECS, MAX_RETRIES, RETRY_BASE_DELAY};
use crate::error::{ReportError, SearchError};

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_MODEL: &str = "sonar-pro";
const SEARCH_INSTRUCTION: &str = "Search the web and provide factual information with sources.";
const FALLBACK_CITATION: &str = "https://perplexity.ai";
const SECONDARY_CONTENT: &str = "See primary source for full content";

/// Perplexity chat-completions client used as a search backend
pub struct PerplexityClient {
    api_key: String,
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl PerplexityClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: RETRY_BASE_DELAY,
        }
    }

    /// Create from environment variable PERPLEXITY_API_KEY
    pub fn from_env() -> Result<Self, ReportError> {
        match std::env::var("PERPLEXITY_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Self::new(key)),
            _ => Err(ReportError::config("PERPLEXITY_API_KEY environment variable not set")),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
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

    async fn execute_single_request(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, SearchError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(SearchError::from_transport)?;

        read_json(response).await
    }
}

/// Map an answer and its citations to source documents
fn citations_to_sources(answer: String, citations: Vec<String>) -> Vec<SourceDocument> {
    let mut citations = citations.into_iter();
    let primary_url = citations.next().unwrap_or_else(|| FALLBACK_CITATION.to_string());

    let mut results = vec![SourceDocument {
        title: "Perplexity Search, Source 1".to_string(),
        url: primary_url,
        content: answer.clone(),
        raw_content: Some(answer),
        score: 1.0,
    }];

    results.extend(citations.enumerate().map(|(i, url)| SourceDocument {
        title: format!("Perplexity Search, Source {}", i + 2),
        url,
        content: SECONDARY_CONTENT.to_string(),
        raw_content: None,
        score: 0.5,
    }));

    results
}

#[async_trait]
impl SearchProvider for PerplexityClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SEARCH_INSTRUCTION },
                ChatMessage { role: "user", content: query },
            ],
        };
        debug!(query = %query, model = %self.model, "Executing Perplexity search");

        let response = with_retry("perplexity", self.max_retries, self.retry_base_delay, || {
            self.execute_single_request(&request)
        })
        .await?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| SearchError::ParseError("response has no choices".to_string()))?;

        Ok(SearchResponse {
            query: query.to_string(),
            results: citations_to_sources(answer, response.citations),
        })
    }

    fn name(&self) -> &str {
        "perplexity"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
