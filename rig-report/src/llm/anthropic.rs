//! Anthropic (Claude) LLM Provider implementation via Rig

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::anthropic::completion::CLAUDE_3_5_SONNET;
use rig::providers::anthropic::Client;

use super::config::LLMConfig;
use super::message::{extract_system_preamble, last_user_prompt, Message};
use super::provider::{LLMProvider, LLMResponse};
use crate::error::ReportError;

/// Anthropic requires max_tokens on every request
const DEFAULT_MAX_TOKENS: u64 = 4096;

/// Anthropic (Claude) LLM Provider
///
/// Wraps rig-core's Anthropic client. Defaults to 4096 output tokens when
/// the call config does not set `max_tokens`.
pub struct AnthropicProvider {
    client: Client,
    default_config: LLMConfig,
}

impl AnthropicProvider {
    /// Create from ANTHROPIC_API_KEY with the default model
    pub fn from_env() -> Result<Self, ReportError> {
        Self::from_env_with_model(CLAUDE_3_5_SONNET)
    }

    /// Create from environment with specific model
    pub fn from_env_with_model(model: impl Into<String>) -> Result<Self, ReportError> {
        if std::env::var("ANTHROPIC_API_KEY").map(|k| k.is_empty()).unwrap_or(true) {
            return Err(ReportError::config("ANTHROPIC_API_KEY environment variable not set"));
        }
        Ok(Self {
            client: Client::from_env(),
            default_config: LLMConfig::new(model).with_max_tokens(DEFAULT_MAX_TOKENS),
        })
    }

    /// Create with explicit API key and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ReportError> {
        let api_key: String = api_key.into();
        if api_key.is_empty() {
            return Err(ReportError::config("Anthropic API key is empty"));
        }
        Ok(Self {
            client: Client::from_val(api_key),
            default_config: LLMConfig::new(model).with_max_tokens(DEFAULT_MAX_TOKENS),
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
impl LLMProvider for AnthropicProvider {
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
        agent_builder = agent_builder.max_tokens(config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));

        let agent = agent_builder.build();
        let prompt = last_user_prompt(messages);

        let response = agent
            .prompt(&prompt)
            .await
            .map_err(|e| ReportError::Llm(format!("Anthropic completion failed: {}", e)))?;

        Ok(LLMResponse::new(Message::assistant(&response)))
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.default_config.model
    }
}
