//! Report workflow configuration
//!
//! `ReportConfig` is resolved once, eagerly, from three layers:
//! explicit overrides, then environment variables, then defaults.
//! Blank values are skipped at every layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::prompts::DEFAULT_REPORT_STRUCTURE;
use crate::error::ReportError;
use crate::search::{SearchApi, SourceBudget};

/// Caller-supplied values; `None` falls through to the environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub report_structure: Option<String>,
    pub number_of_queries: Option<usize>,
    pub max_search_depth: Option<usize>,
    pub search_api: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report_structure(mut self, structure: impl Into<String>) -> Self {
        self.report_structure = Some(structure.into());
        self
    }

    pub fn with_number_of_queries(mut self, n: usize) -> Self {
        self.number_of_queries = Some(n);
        self
    }

    pub fn with_max_search_depth(mut self, depth: usize) -> Self {
        self.max_search_depth = Some(depth);
        self
    }

    pub fn with_search_api(mut self, api: impl Into<String>) -> Self {
        self.search_api = Some(api.into());
        self
    }
}

/// Validated report configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportConfig {
    pub report_structure: String,
    /// Queries generated per planning or research step (>= 1)
    pub number_of_queries: usize,
    /// Hard ceiling on search iterations per section (>= 1)
    pub max_search_depth: usize,
    pub search_api: SearchApi,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_structure: DEFAULT_REPORT_STRUCTURE.to_string(),
            number_of_queries: 2,
            max_search_depth: 2,
            search_api: SearchApi::Tavily,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_count(name: &str, raw: &str) -> Result<usize, ReportError> {
    raw.trim()
        .parse()
        .map_err(|_| ReportError::config(format!("{} must be a positive integer, got {:?}", name, raw)))
}

impl ReportConfig {
    /// Resolve from overrides and the process environment
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ReportError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve_with<F>(overrides: &ConfigOverrides, env: F) -> Result<Self, ReportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let report_structure = non_blank(overrides.report_structure.clone())
            .or_else(|| non_blank(env("REPORT_STRUCTURE")))
            .unwrap_or(defaults.report_structure);

        let number_of_queries = match (overrides.number_of_queries, non_blank(env("NUMBER_OF_QUERIES"))) {
            (Some(n), _) => n,
            (None, Some(raw)) => parse_count("NUMBER_OF_QUERIES", &raw)?,
            (None, None) => defaults.number_of_queries,
        };

        let max_search_depth = match (overrides.max_search_depth, non_blank(env("MAX_SEARCH_DEPTH"))) {
            (Some(n), _) => n,
            (None, Some(raw)) => parse_count("MAX_SEARCH_DEPTH", &raw)?,
            (None, None) => defaults.max_search_depth,
        };

        let search_api = match non_blank(overrides.search_api.clone()).or_else(|| non_blank(env("SEARCH_API"))) {
            Some(raw) => raw.parse()?,
            None => defaults.search_api,
        };

        let config = Self { report_structure, number_of_queries, max_search_depth, search_api };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.number_of_queries == 0 {
            return Err(ReportError::config("number_of_queries must be at least 1"));
        }
        if self.max_search_depth == 0 {
            return Err(ReportError::config("max_search_depth must be at least 1"));
        }
        if self.report_structure.trim().is_empty() {
            return Err(ReportError::config("report_structure cannot be empty"));
        }
        Ok(())
    }
}

/// Execution knobs that do not change what the report contains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Timeout for a single LLM call
    #[serde(with = "humantime_serde")]
    pub llm_timeout: Duration,

    /// Maximum concurrently running section tasks per fan-out
    pub parallelism: usize,

    /// Source budget while planning
    pub plan_sources: SourceBudget,

    /// Token budget per source while researching a section
    pub section_tokens_per_source: usize,

    /// Where the compiled report is written
    pub output_path: PathBuf,

    /// A `Resumed` claim younger than this belongs to a live run; `recover`
    /// leaves it alone unless forced
    #[serde(with = "humantime_serde", default = "default_stale_claim_after")]
    pub stale_claim_after: Duration,
}

fn default_stale_claim_after() -> Duration {
    Duration::from_secs(30 * 60)
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(120),
            parallelism: num_cpus::get(),
            plan_sources: SourceBudget::new(1000, false),
            section_tokens_per_source: 5000,
            output_path: PathBuf::from("data/final_report.md"),
            stale_claim_after: default_stale_claim_after(),
        }
    }
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_stale_claim_after(mut self, age: Duration) -> Self {
        self.stale_claim_after = age;
        self
    }

    /// Section-stage budget; raw content only when the provider supplies it
    pub fn section_sources(&self, include_raw_content: bool) -> SourceBudget {
        SourceBudget::new(self.section_tokens_per_source, include_raw_content)
    }
}
