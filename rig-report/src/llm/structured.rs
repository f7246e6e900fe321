//! Structured output on top of plain-text completions
//!
//! Models are asked to answer with JSON matching a schema. Answers are often
//! wrapped in a fenced ```` ```json ```` block, so the block body is extracted
//! before deserializing. Any mismatch is reported as `ReportError::Parse`.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::message::Message;
use super::provider::LLMProvider;
use crate::error::ReportError;

static JSON_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?[ \t]*\r?\n(.*?)\r?\n?```").expect("valid JSON block pattern")
});

/// Extract the body of the first fenced code block, or the trimmed input
/// when the text is not fenced.
pub fn extract_json_block(text: &str) -> String {
    match JSON_BLOCK.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => {
            warn!("Could not extract JSON from markdown code block, using raw text");
            text.trim().to_string()
        }
    }
}

/// Parse model output into `T`
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, ReportError> {
    let json = extract_json_block(text);
    debug!(json = %json, "Extracted JSON content");
    serde_json::from_str(&json).map_err(|e| ReportError::Parse(e.to_string()))
}

/// Timed completion helper shared by all workflow nodes
#[derive(Clone)]
pub struct StructuredOutput {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl StructuredOutput {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Underlying provider
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Plain-text completion from a system instruction and a human turn
    pub async fn text(&self, system: &str, human: &str) -> Result<String, ReportError> {
        let messages = [Message::system(system), Message::user(human)];
        let response = tokio::time::timeout(self.timeout, self.provider.complete(&messages, None))
            .await
            .map_err(|_| ReportError::Timeout(self.timeout))??;
        Ok(response.message.content)
    }

    /// Completion constrained to the given JSON schema
    pub async fn json<T: DeserializeOwned>(
        &self,
        system: &str,
        human: &str,
        schema: &serde_json::Value,
    ) -> Result<T, ReportError> {
        let instructions = format!(
            "{}\n\nRespond only with a JSON object matching this JSON schema:\n{}",
            system, schema
        );
        let raw = self.text(&instructions, human).await?;
        debug!(provider = self.provider.name(), raw = %raw, "Raw structured output");
        parse_structured(&raw)
    }
}
