//! # Agent Module
//!
//! Wires the application configuration into a `ReportWorkflow`:
//! - an LLM provider (OpenAI or Anthropic via Rig)
//! - a search client chosen by `SEARCH_API`
//! - a file checkpointer so threads survive between invocations

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use rig_report::{
    create_checkpointer, AnthropicProvider, Checkpointer, CheckpointerConfig, ConfigOverrides,
    FeedbackInput, LLMProvider, OpenAIProvider, ReportConfig, ReportContext, ReportWorkflow, RuntimeOptions,
    WorkflowEvent,
};

use crate::config::{Config, LlmBackend};

// =============================================================================
// PROVIDER CONSTRUCTION
// =============================================================================
/// Build the LLM provider selected by the configuration.
///
/// # Rust Concept: Trait Objects
///
/// `Arc<dyn LLMProvider>` erases the concrete provider type so the rest of
/// the program does not care which backend is in use.
fn build_llm(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.provider {
        LlmBackend::OpenAI => {
            let provider = match &config.model {
                Some(model) => OpenAIProvider::from_env_with_model(model.clone()),
                None => OpenAIProvider::from_env(),
            }
            .context("Failed to create OpenAI provider")?;
            Arc::new(provider.with_temperature(config.temperature))
        }
        LlmBackend::Anthropic => {
            let provider = match &config.model {
                Some(model) => AnthropicProvider::from_env_with_model(model.clone()),
                None => AnthropicProvider::from_env(),
            }
            .context("Failed to create Anthropic provider")?;
            Arc::new(provider.with_temperature(config.temperature))
        }
    };

    debug!(provider = provider.name(), model = provider.default_model(), "LLM provider ready");
    Ok(provider)
}

/// File checkpointer under the configured directory
pub fn open_checkpointer(config: &Config) -> Arc<dyn Checkpointer> {
    create_checkpointer(CheckpointerConfig::File {
        path: config.checkpoint_dir.clone(),
        compression: config.checkpoint_compression,
    })
}

fn runtime_options(config: &Config) -> RuntimeOptions {
    let options = RuntimeOptions::new()
        .with_llm_timeout(config.llm_timeout)
        .with_output_path(config.output_path.clone());
    match config.max_concurrency {
        Some(n) => options.with_parallelism(n),
        None => options,
    }
}

// =============================================================================
// REPORT AGENT
// =============================================================================
/// Report workflow with application-level error context.
pub struct ReportAgent {
    workflow: ReportWorkflow,
}

impl ReportAgent {
    /// Resolve report settings and build every service the workflow needs.
    ///
    /// Fails before any work starts when a key or setting is missing.
    pub fn new(config: &Config, overrides: &ConfigOverrides) -> Result<Self> {
        let report_config = ReportConfig::resolve(overrides).context("Invalid report configuration")?;
        let search = report_config
            .search_api
            .client(None)
            .with_context(|| format!("Failed to create {} search client", report_config.search_api))?;
        let llm = build_llm(config)?;

        info!(
            llm = llm.name(),
            model = llm.default_model(),
            search = %report_config.search_api,
            queries = report_config.number_of_queries,
            max_depth = report_config.max_search_depth,
            checkpoints = %config.checkpoint_dir.display(),
            "Report agent configured"
        );

        let ctx = ReportContext::new(llm, search, report_config, runtime_options(config));
        Ok(Self {
            workflow: ReportWorkflow::new(ctx, open_checkpointer(config)),
        })
    }

    pub async fn start(&self, thread_id: &str, topic: &str) -> Result<WorkflowEvent> {
        self.workflow
            .start(thread_id, topic)
            .await
            .with_context(|| format!("Failed to start thread {}", thread_id))
    }

    pub async fn resume(&self, thread_id: &str, feedback: impl Into<FeedbackInput>) -> Result<WorkflowEvent> {
        self.workflow
            .resume(thread_id, feedback)
            .await
            .with_context(|| format!("Failed to resume thread {}", thread_id))
    }

    pub async fn recover(&self, thread_id: &str, force: bool) -> Result<WorkflowEvent> {
        self.workflow
            .recover(thread_id, force)
            .await
            .with_context(|| format!("Failed to recover thread {}", thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_runtime_options_from_config() {
        let config = Config {
            llm_timeout: Duration::from_secs(10),
            max_concurrency: Some(3),
            output_path: PathBuf::from("out/r.md"),
            ..Config::default()
        };
        let options = runtime_options(&config);
        assert_eq!(options.llm_timeout, Duration::from_secs(10));
        assert_eq!(options.parallelism, 3);
        assert_eq!(options.output_path, PathBuf::from("out/r.md"));
    }

    #[tokio::test]
    async fn test_open_checkpointer_uses_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            checkpoint_dir: dir.path().join("ckpt"),
            ..Config::default()
        };
        let checkpointer = open_checkpointer(&config);
        assert!(checkpointer.list_threads().await.unwrap().is_empty());
    }
}
