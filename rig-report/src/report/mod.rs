//! Report generation stages
//!
//! - `plan`: plan generation and feedback routing
//! - `section`: per-section research loop
//! - `writer`: final section writers and research context
//! - `compiler`: plan-ordered assembly of the final document

pub mod compiler;
pub mod config;
pub mod context;
pub mod plan;
pub mod prompts;
pub mod section;
pub mod state;
pub mod writer;

pub use compiler::{compile_report, persist_report, MISSING_SECTION_PLACEHOLDER};
pub use config::{ConfigOverrides, ReportConfig, RuntimeOptions};
pub use context::ReportContext;
pub use plan::{generate_plan, render_feedback_prompt, route_feedback, FeedbackInput, FeedbackRoute};
pub use prompts::{ReportPrompts, DEFAULT_REPORT_STRUCTURE};
pub use section::{next_step, run_section, SectionState, SectionStep};
pub use state::{Feedback, Grade, Queries, ReportState, SearchQuery, Section, Sections};
pub use writer::{format_sections, write_final_section, WRITE_ERROR_SENTINEL};
