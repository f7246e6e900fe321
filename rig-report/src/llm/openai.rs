//! OpenAI LLM Provider implementation via Rig

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai::Client;

use super::config::LLMConfig;
use super::message::{extract_system_preamble, last_user_prompt, Message};
use super::provider::{LLMProvider, LLMResponse};
use crate::error::ReportError;

/// Default OpenAI model for report generation
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";

/// OpenAI LLM Provider
///
/// Wraps rig-core's OpenAI client. A fresh single-turn agent is built per
/// call so each workflow step can carry its own preamble.
///
/// ```rust,ignore
/// let provider = OpenAIProvider::from_env()?;
/// let provider = OpenAIProvider::new("sk-...", "gpt-4.1")?;
/// ```
pub struct OpenAIProvider {
    client: Client,
    default_config: LLMConfig,
}

impl OpenAIProvider {
    /// Create from OPENAI_API_KEY with the default model
    pub fn from_env() -> Result<Self, ReportError> {
        Self::from_env_with_model(DEFAULT_OPENAI_MODEL)
    }

    /// Create from environment with specific model
    pub fn from_env_with_model(model: impl Into<String>) -> Result<Self, ReportError> {
        if std::env::var("OPENAI_API_KEY").map(|k| k.is_empty()).unwrap_or(true) {
            return Err(ReportError::config("OPENAI_API_KEY environment variable not set"));
        }
        Ok(Self {
            client: Client::from_env(),
            default_config: LLMConfig::new(model),
        })
    }

    /// Create with explicit API key and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ReportError> {
        let api_key: String = api_key.into();
        if api_key.is_empty() {
            return Err(ReportError::config("OpenAI API key is empty"));
        }
        Ok(Self {
            client: Client::from_val(api_key.into()),
            default_config: LLMConfig::new(model),
        })
    }

    /// Set the default sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.default_config.temperature = Some(temperature);
        self
    }

    fn effective_config<'a>(&'a self, runtime: Option<&'a LLMConfig>) -> &'a LLMConfig {
        runtime.unwrap_or(&self.default_config)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: &[Message],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ReportError> {
        let config = self.effective_config(config);

        let mut agent_builder = self.client.agent(&config.model);

        if let Some(preamble) = extract_system_preamble(messages) {
            agent_builder = agent_builder.preamble(&preamble);
        }
        if let Some(temp) = config.temperature {
            agent_builder = agent_builder.temperature(temp);
        }
        if let Some(max_tokens) = config.max_tokens {
            agent_builder = agent_builder.max_tokens(max_tokens);
        }

        let agent = agent_builder.build();
        let prompt = last_user_prompt(messages);

        let response = agent
            .prompt(&prompt)
            .await
            .map_err(|e| ReportError::Llm(format!("OpenAI completion failed: {}", e)))?;

        Ok(LLMResponse::new(Message::assistant(&response)))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_config.model
    }
}
