//! Error types for the report workflow
//!
//! Node-local failures (LLM, search, parse) are caught inside the workflow
//! and degraded to empty or sentinel values. Only configuration errors and
//! checkpoint-store errors reach the caller of `ReportWorkflow`.

use thiserror::Error;

/// Top-level error for the report workflow
#[derive(Error, Debug)]
pub enum ReportError {
    /// Caller misconfiguration (unsupported search provider, invalid counts)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Another resume is already running for this thread
    #[error("Thread busy: {0}")]
    ThreadBusy(String),

    #[error("Thread already exists: {0}")]
    ThreadExists(String),

    #[error("Unknown thread: {0}")]
    UnknownThread(String),

    #[error("Invalid thread id: {0:?}")]
    InvalidThreadId(String),

    /// The checkpoint for this thread is not waiting for feedback
    #[error("Thread {thread_id} is not suspended (status: {status})")]
    NotSuspended { thread_id: String, status: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Structured model output did not match the expected schema
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReportError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a checkpoint error
    pub fn checkpoint_error(message: impl Into<String>) -> Self {
        Self::Checkpoint(message.into())
    }

    /// Whether this error must abort the workflow instead of degrading a step
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReportError::Config(_)
                | ReportError::Checkpoint(_)
                | ReportError::ThreadBusy(_)
                | ReportError::ThreadExists(_)
                | ReportError::UnknownThread(_)
                | ReportError::InvalidThreadId(_)
                | ReportError::NotSuspended { .. }
        )
    }
}

/// Typed errors for search provider HTTP calls
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout
                | SearchError::Connection(_)
                | SearchError::RateLimited
                | SearchError::ServerError(_, _)
        )
    }

    /// Map a reqwest transport error
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::Connection(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }

    /// Map a non-success HTTP status
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => SearchError::Unauthorized,
            429 => SearchError::RateLimited,
            400 => SearchError::BadRequest(body),
            500..=599 => SearchError::ServerError(status, body),
            _ => SearchError::HttpError(status, body),
        }
    }
}
