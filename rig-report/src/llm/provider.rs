//! LLM Provider trait definition
//!
//! The workflow only talks to models through this trait, so tests can
//! substitute scripted fakes for the Rig-backed providers.

use async_trait::async_trait;

use super::config::LLMConfig;
use super::message::Message;
use crate::error::ReportError;

/// LLM completion response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// The assistant's response message
    pub message: Message,
}

impl LLMResponse {
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    /// Response text
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Core LLM Provider trait
///
/// Providers are process-wide and stateless per call; one instance is shared
/// by every concurrently running section loop.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for the given conversation.
    ///
    /// `config` overrides the provider's default model settings for this call.
    async fn complete(
        &self,
        messages: &[Message],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ReportError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Default model identifier
    fn default_model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn complete(
            &self,
            messages: &[Message],
            _config: Option<&LLMConfig>,
        ) -> Result<LLMResponse, ReportError> {
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            Ok(LLMResponse::new(Message::assistant(last)))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "echo-1"
        }
    }

    static_assertions::assert_obj_safe!(LLMProvider);

    #[tokio::test]
    async fn test_provider_as_trait_object() {
        let provider: Arc<dyn LLMProvider> = Arc::new(EchoProvider);
        let response = provider.complete(&[Message::user("ping")], None).await.unwrap();
        assert_eq!(response.content(), "ping");
        assert_eq!(provider.name(), "echo");
        assert_eq!(provider.default_model(), "echo-1");
    }
}
