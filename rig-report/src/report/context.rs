//! Service handles threaded through every workflow node

use std::sync::Arc;

use super::config::{ReportConfig, RuntimeOptions};
use crate::llm::{LLMProvider, StructuredOutput};
use crate::search::{SearchProvider, SourceBudget};

/// Shared, read-only services for one workflow
///
/// Clients are stateless per call and safe to share across section tasks.
#[derive(Clone)]
pub struct ReportContext {
    pub llm: StructuredOutput,
    pub search: Arc<dyn SearchProvider>,
    pub config: ReportConfig,
    pub options: RuntimeOptions,
}

impl ReportContext {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        search: Arc<dyn SearchProvider>,
        config: ReportConfig,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            llm: StructuredOutput::new(llm, options.llm_timeout),
            search,
            config,
            options,
        }
    }

    /// Source budget for section research with the configured provider
    pub fn section_sources(&self) -> SourceBudget {
        self.options.section_sources(self.search.includes_raw_content())
    }
}
