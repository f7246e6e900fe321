//! Plan stage: generation, feedback prompt and approval routing

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::context::ReportContext;
use super::prompts::ReportPrompts;
use super::state::{dedup_section_names, Queries, Section, Sections};
use crate::search::{deduplicate_and_format_sources, execute_queries};

/// Value injected when resuming at the feedback checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedbackInput {
    Bool(bool),
    Text(String),
}

impl From<bool> for FeedbackInput {
    fn from(value: bool) -> Self {
        FeedbackInput::Bool(value)
    }
}

impl From<&str> for FeedbackInput {
    fn from(value: &str) -> Self {
        FeedbackInput::Text(value.to_string())
    }
}

impl From<String> for FeedbackInput {
    fn from(value: String) -> Self {
        FeedbackInput::Text(value)
    }
}

/// Where the workflow goes after feedback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackRoute {
    /// Plan accepted; fan out research
    Approve,
    /// Regenerate the plan with this feedback appended
    Revise(String),
    /// Nothing actionable; ask again without regenerating
    Reprompt,
}

/// Route feedback: `true` / `"true"` (any case) approves, other non-blank text
/// revises, blank text and `false` re-prompt.
pub fn route_feedback(input: &FeedbackInput) -> FeedbackRoute {
    match input {
        FeedbackInput::Bool(true) => FeedbackRoute::Approve,
        FeedbackInput::Bool(false) => FeedbackRoute::Reprompt,
        FeedbackInput::Text(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") {
                FeedbackRoute::Approve
            } else if text.is_empty() {
                FeedbackRoute::Reprompt
            } else {
                FeedbackRoute::Revise(text.to_string())
            }
        }
    }
}

/// Human-readable plan shown at the feedback checkpoint
pub fn render_feedback_prompt(sections: &[Section]) -> String {
    let sections_str = sections
        .iter()
        .map(|s| {
            format!(
                "Section: {}\nDescription: {}\nResearch needed: {}\n",
                s.name,
                s.description,
                if s.research { "Yes" } else { "No" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Please provide feedback on the following report plan:\n\n{}\n\n\
         Does the report plan meet your needs? Enter 'true' to approve, or provide feedback as a string to regenerate the plan:",
        sections_str
    )
}

/// Generate a section plan for `topic`.
///
/// Every failure (query generation, search, model output that does not match
/// the schema) is logged and yields an empty or partial result, never an error.
pub async fn generate_plan(ctx: &ReportContext, topic: &str, feedback: &[String]) -> Vec<Section> {
    info!(topic = %topic, revisions = feedback.len(), "Generating report plan");
    let config = &ctx.config;

    let query_instructions =
        ReportPrompts::planner_queries(topic, &config.report_structure, config.number_of_queries);
    let queries = match ctx
        .llm
        .json::<Queries>(&query_instructions, ReportPrompts::PLANNER_QUERIES_HUMAN, &ReportPrompts::queries_schema())
        .await
    {
        Ok(queries) => queries.into_texts(config.number_of_queries),
        Err(e) => {
            error!(error = %e, "Error generating planning queries");
            Vec::new()
        }
    };

    let responses = execute_queries(ctx.search.as_ref(), &queries).await;
    let source_str = deduplicate_and_format_sources(&responses, ctx.options.plan_sources);

    let instructions = ReportPrompts::planner(topic, &config.report_structure, &source_str, feedback);
    match ctx
        .llm
        .json::<Sections>(&instructions, ReportPrompts::PLANNER_HUMAN, &ReportPrompts::sections_schema())
        .await
    {
        Ok(parsed) => {
            let sections: Vec<Section> = dedup_section_names(parsed.sections)
                .into_iter()
                .map(|s| s.with_content(""))
                .collect();
            if sections.is_empty() {
                warn!("Planner returned no sections");
            }
            info!(sections = sections.len(), "Report plan generated");
            sections
        }
        Err(e) => {
            error!(error = %e, "Error generating report sections");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_values() {
        for value in ["true", "TRUE", "True", "  true  "] {
            assert_eq!(route_feedback(&value.into()), FeedbackRoute::Approve, "{value}");
        }
        assert_eq!(route_feedback(&true.into()), FeedbackRoute::Approve);
    }

    #[test]
    fn test_revision_values() {
        assert_eq!(
            route_feedback(&"Add a section on pricing".into()),
            FeedbackRoute::Revise("Add a section on pricing".to_string())
        );
        assert_eq!(route_feedback(&"yes".into()), FeedbackRoute::Revise("yes".to_string()));
        assert_eq!(route_feedback(&"truely not".into()), FeedbackRoute::Revise("truely not".to_string()));
    }

    #[test]
    fn test_empty_feedback_reprompts() {
        assert_eq!(route_feedback(&"".into()), FeedbackRoute::Reprompt);
        assert_eq!(route_feedback(&"   \n".into()), FeedbackRoute::Reprompt);
        assert_eq!(route_feedback(&false.into()), FeedbackRoute::Reprompt);
    }

    #[test]
    fn test_feedback_input_untagged_serde() {
        let input: FeedbackInput = serde_json::from_str("true").unwrap();
        assert_eq!(input, FeedbackInput::Bool(true));
        let input: FeedbackInput = serde_json::from_str(r#""true""#).unwrap();
        assert_eq!(input, FeedbackInput::Text("true".to_string()));
    }

    #[test]
    fn test_render_feedback_prompt() {
        let prompt = render_feedback_prompt(&[
            Section::new("Intro", "Overview", false),
            Section::new("Runtime", "Executors", true),
        ]);

        assert!(prompt.starts_with("Please provide feedback on the following report plan:\n\n"));
        assert!(prompt.contains("Section: Intro\nDescription: Overview\nResearch needed: No\n\n\nSection: Runtime"));
        assert!(prompt.contains("Research needed: Yes"));
        assert!(prompt.ends_with("provide feedback as a string to regenerate the plan:"));
    }
}
