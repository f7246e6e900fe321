//! # Configuration Module
//!
//! Loads the binary's settings from environment variables (and a `.env`
//! file). Report-shaping settings such as `NUMBER_OF_QUERIES` are resolved
//! by `rig_report::ReportConfig`; this module only covers what the
//! application itself needs to wire the workflow together:
//! - which LLM backend and model to use
//! - where checkpoints and the final report live
//! - timeouts and fan-out concurrency

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// LLM BACKEND
// =============================================================================
/// Which hosted model family writes the report.
///
/// # Rust Concept: FromStr
/// Implementing `FromStr` lets us call `.parse()` on strings, the same way
/// numbers are parsed. Clap and our env loader both reuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    #[default]
    OpenAI,
    Anthropic,
}

impl FromStr for LlmBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmBackend::OpenAI),
            "anthropic" => Ok(LlmBackend::Anthropic),
            other => anyhow::bail!("LLM_PROVIDER must be 'openai' or 'anthropic', got: {}", other),
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmBackend::OpenAI => f.write_str("openai"),
            LlmBackend::Anthropic => f.write_str("anthropic"),
        }
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the report agent.
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM backend (LLM_PROVIDER)
    pub provider: LlmBackend,

    /// Model name; `None` uses the backend's default (LLM_MODEL)
    pub model: Option<String>,

    /// Sampling temperature (TEMPERATURE)
    pub temperature: f64,

    /// Timeout for a single LLM call (LLM_TIMEOUT_SECS)
    pub llm_timeout: Duration,

    /// Maximum concurrently running section tasks; `None` uses the CPU count
    /// (MAX_CONCURRENCY)
    pub max_concurrency: Option<usize>,

    /// Directory holding one checkpoint file per thread (CHECKPOINT_DIR)
    pub checkpoint_dir: PathBuf,

    /// Compress checkpoint files with zstd (CHECKPOINT_COMPRESSION)
    pub checkpoint_compression: bool,

    /// Where the compiled report is written (REPORT_OUTPUT_PATH)
    pub output_path: PathBuf,
}

/// Per-user checkpoint directory, falling back to the working directory
fn default_checkpoint_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("report-agent").join("checkpoints"))
        .unwrap_or_else(|| PathBuf::from("checkpoints"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: LlmBackend::OpenAI,
            model: None,
            temperature: 0.0,
            llm_timeout: Duration::from_secs(120),
            max_concurrency: None,
            checkpoint_dir: default_checkpoint_dir(),
            checkpoint_compression: false,
            output_path: PathBuf::from("data/final_report.md"),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first, if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an explicit variable lookup.
    ///
    /// Unset and blank variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(val) = var("LLM_PROVIDER") {
            config.provider = val.parse()?;
        }

        if let Some(val) = var("LLM_MODEL") {
            config.model = Some(val.trim().to_string());
        }

        if let Some(val) = var("TEMPERATURE") {
            config.temperature = val
                .trim()
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.2)")?;
        }

        if let Some(val) = var("LLM_TIMEOUT_SECS") {
            let secs: u64 = val
                .trim()
                .parse()
                .context("LLM_TIMEOUT_SECS must be a valid positive integer")?;
            config.llm_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = var("MAX_CONCURRENCY") {
            config.max_concurrency = Some(
                val.trim()
                    .parse()
                    .context("MAX_CONCURRENCY must be a valid positive integer")?,
            );
        }

        if let Some(val) = var("CHECKPOINT_DIR") {
            config.checkpoint_dir = PathBuf::from(val);
        }

        if let Some(val) = var("CHECKPOINT_COMPRESSION") {
            config.checkpoint_compression = val
                .trim()
                .parse()
                .context("CHECKPOINT_COMPRESSION must be 'true' or 'false'")?;
        }

        if let Some(val) = var("REPORT_OUTPUT_PATH") {
            config.output_path = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("Temperature must be between 0.0 and 2.0, got: {}", self.temperature);
        }

        if self.llm_timeout.is_zero() {
            anyhow::bail!("LLM_TIMEOUT_SECS must be at least 1");
        }

        if self.max_concurrency == Some(0) {
            anyhow::bail!("MAX_CONCURRENCY must be at least 1");
        }

        if matches!(&self.model, Some(model) if model.is_empty()) {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }

        if self.output_path.as_os_str().is_empty() {
            anyhow::bail!("REPORT_OUTPUT_PATH cannot be empty");
        }

        Ok(())
    }
}
