//! rig-report: research report generation as a checkpointed workflow on Rig
//!
//! A report is planned by an LLM, reviewed by a human, then researched
//! section by section against a web-search provider and compiled into a
//! single Markdown document.
//!
//! - `report`: plan, section research loop, writers and compiler
//! - `workflow`: node topology, fan-out and the suspend/resume interpreter
//! - `checkpoint`: thread-keyed checkpoint stores (memory, file)
//! - `llm`: provider abstraction over Rig's OpenAI and Anthropic clients
//! - `search`: Tavily and Perplexity clients plus source formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use rig_report::{
//!     create_checkpointer, CheckpointerConfig, ConfigOverrides, OpenAIProvider, ReportConfig,
//!     ReportContext, ReportWorkflow, RuntimeOptions,
//! };
//!
//! let config = ReportConfig::resolve(&ConfigOverrides::new())?;
//! let search = config.search_api.client(None)?;
//! let llm = Arc::new(OpenAIProvider::from_env()?);
//! let ctx = ReportContext::new(llm, search, config, RuntimeOptions::default());
//!
//! let workflow = ReportWorkflow::new(ctx, create_checkpointer(CheckpointerConfig::Memory));
//! let event = workflow.start("thread-1", "WebAssembly runtimes").await?;
//! ```

pub mod checkpoint;
pub mod error;
pub mod llm;
pub mod report;
pub mod search;
pub mod workflow;

pub use checkpoint::{
    create_checkpointer, Checkpoint, CheckpointStatus, Checkpointer, CheckpointerConfig, FileCheckpointer,
    MemoryCheckpointer,
};
pub use error::{ReportError, SearchError};
pub use llm::{AnthropicProvider, LLMConfig, LLMProvider, LLMResponse, Message, OpenAIProvider, Role};
pub use report::{
    compile_report, ConfigOverrides, FeedbackInput, ReportConfig, ReportContext, ReportState, RuntimeOptions,
    Section, DEFAULT_REPORT_STRUCTURE, MISSING_SECTION_PLACEHOLDER, WRITE_ERROR_SENTINEL,
};
pub use search::{PerplexityClient, SearchApi, SearchProvider, SearchResponse, SourceDocument, TavilyClient};
pub use workflow::{ReportNode, ReportWorkflow, WorkflowEvent};
