//! Per-section research loop
//!
//! ```text
//! GenerateQueries ──► Search ──► Write ──► Grade ──► Done
//!                       ▲                    │
//!                       └──── follow-ups ────┘   (fail and iterations < max)
//! ```
//!
//! `Search` is the only step that increments `iteration_count`, so a section
//! never runs more than `max_search_depth` searches whatever the grades say.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::context::ReportContext;
use super::prompts::ReportPrompts;
use super::state::{Feedback, Queries, SearchQuery, Section};
use super::writer::{non_empty_or_sentinel, WRITE_ERROR_SENTINEL};
use crate::search::{deduplicate_and_format_sources, execute_queries};

/// States of the section loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SectionStep {
    GenerateQueries,
    Search,
    Write,
    Grade,
    Done,
}

/// Private state of one running section loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionState {
    pub section: Section,
    pub iteration_count: usize,
    pub pending_queries: Vec<SearchQuery>,
    pub source_text: String,
}

impl SectionState {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            iteration_count: 0,
            pending_queries: Vec::new(),
            source_text: String::new(),
        }
    }
}

/// Pure transition function of the section loop.
///
/// `grade` is only consulted when leaving `Grade`.
pub fn next_step(
    step: SectionStep,
    iteration_count: usize,
    grade: Option<&Feedback>,
    max_search_depth: usize,
) -> SectionStep {
    match step {
        SectionStep::GenerateQueries => SectionStep::Search,
        SectionStep::Search => SectionStep::Write,
        SectionStep::Write => SectionStep::Grade,
        SectionStep::Grade => {
            let passed = grade.map(Feedback::is_pass).unwrap_or(false);
            if passed || iteration_count >= max_search_depth {
                SectionStep::Done
            } else {
                SectionStep::Search
            }
        }
        SectionStep::Done => SectionStep::Done,
    }
}

async fn generate_queries(ctx: &ReportContext, section: &Section) -> Vec<SearchQuery> {
    let n = ctx.config.number_of_queries;
    let instructions = ReportPrompts::section_queries(&section.description, n);
    match ctx
        .llm
        .json::<Queries>(&instructions, ReportPrompts::SECTION_QUERIES_HUMAN, &ReportPrompts::queries_schema())
        .await
    {
        Ok(queries) => queries.into_texts(n).into_iter().map(SearchQuery::new).collect(),
        Err(e) => {
            error!(section = %section.name, error = %e, "Error generating queries");
            Vec::new()
        }
    }
}

async fn search(ctx: &ReportContext, state: &mut SectionState) {
    let queries: Vec<String> = state.pending_queries.iter().map(|q| q.text.clone()).collect();
    let responses = execute_queries(ctx.search.as_ref(), &queries).await;
    state.source_text = deduplicate_and_format_sources(&responses, ctx.section_sources());
    state.iteration_count += 1;
    debug!(
        section = %state.section.name,
        iteration = state.iteration_count,
        queries = queries.len(),
        "Section search complete"
    );
}

async fn write(ctx: &ReportContext, state: &mut SectionState) {
    let section = &state.section;
    let instructions =
        ReportPrompts::section_writer(&section.name, &section.description, &state.source_text, &section.content);

    state.section.content = match ctx.llm.text(&instructions, ReportPrompts::SECTION_WRITER_HUMAN).await {
        Ok(content) => non_empty_or_sentinel(content),
        Err(e) => {
            error!(section = %state.section.name, error = %e, "Error writing section");
            WRITE_ERROR_SENTINEL.to_string()
        }
    };
}

async fn grade(ctx: &ReportContext, section: &Section) -> Feedback {
    let instructions = ReportPrompts::section_grader(&section.description, &section.content);
    match ctx
        .llm
        .json::<Feedback>(&instructions, ReportPrompts::SECTION_GRADER_HUMAN, &ReportPrompts::feedback_schema())
        .await
    {
        Ok(feedback) => feedback,
        Err(e) => {
            error!(section = %section.name, error = %e, "Error grading section");
            Feedback::fail()
        }
    }
}

/// Run the research loop for one section to completion.
///
/// Always returns the section with non-empty content (possibly the error
/// sentinel); provider failures degrade individual steps.
pub async fn run_section(ctx: &ReportContext, section: Section) -> Section {
    let max_depth = ctx.config.max_search_depth;
    let mut state = SectionState::new(section);
    let mut step = SectionStep::GenerateQueries;
    info!(section = %state.section.name, max_depth, "Starting section research");

    loop {
        let mut feedback = None;
        match step {
            SectionStep::GenerateQueries => {
                state.pending_queries = generate_queries(ctx, &state.section).await;
            }
            SectionStep::Search => search(ctx, &mut state).await,
            SectionStep::Write => write(ctx, &mut state).await,
            SectionStep::Grade => {
                let result = grade(ctx, &state.section).await;
                state.pending_queries = result.follow_up_queries.clone();
                feedback = Some(result);
            }
            SectionStep::Done => break,
        }
        step = next_step(step, state.iteration_count, feedback.as_ref(), max_depth);
    }

    info!(
        section = %state.section.name,
        iterations = state.iteration_count,
        "Section research complete"
    );
    state.section
}
