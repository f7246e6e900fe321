//! Prompt templates for the report workflow
//!
//! One system instruction per node plus the fixed human turn that goes with
//! it. JSON schemas for structured calls live next to the prompts that use them.

use chrono::Utc;
use serde_json::{json, Value};

/// Default section layout handed to the planner
pub const DEFAULT_REPORT_STRUCTURE: &str = r#"The report structure should focus on breaking-down the user-provided topic:

1. Introduction (no research needed)
   - Brief overview of the topic area

2. Main Body Sections:
   - Each section should focus on a sub-topic of the user-provided topic
   - Include any key concepts and definitions
   - Provide real-world examples or case studies where applicable

3. Conclusion
   - Aim for 1 structural element (either a list or table) that distills the main body sections
   - Provide a concise summary of the report"#;

/// Prompt templates for each workflow node
pub struct ReportPrompts;

impl ReportPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Queries used to gather context before planning
    pub fn planner_queries(topic: &str, report_structure: &str, number_of_queries: usize) -> String {
        format!(
            r#"You are an expert technical writer, helping to plan a report.

For context, today's date is {date}.

The report will be focused on the following topic:
{topic}

The report structure will follow these guidelines:
{report_structure}

Your goal is to generate {number_of_queries} search queries that will help gather comprehensive information for planning the report sections.

The queries should:
1. Be related to the topic of the report
2. Help satisfy the requirements specified in the report organization
3. Be specific enough to find high-quality, relevant sources"#,
            date = Self::current_date(),
        )
    }

    pub const PLANNER_QUERIES_HUMAN: &'static str =
        "Generate search queries that will help with planning the sections of the report.";

    /// Section planner
    pub fn planner(topic: &str, report_structure: &str, context: &str, feedback: &[String]) -> String {
        let feedback = if feedback.is_empty() {
            "None".to_string()
        } else {
            feedback
                .iter()
                .enumerate()
                .map(|(i, f)| format!("{}. {}", i + 1, f))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are an expert technical writer, helping to plan a report.

Your goal is to generate the outline of the sections of the report.

The topic of the report is:
{topic}

The report should follow this organization:
{report_structure}

You should reflect on this information to plan the sections of the report:
{context}

Each section must have:
- name: a short, unique name for this section of the report
- description: a brief overview of the main topics covered in this section
- research: whether to perform web research for this section of the report
- content: always an empty string

Integration guidelines:
- Include examples and implementation details within main topic sections, not as separate sections
- Ensure each section has a distinct purpose with no content overlap
- Combine related concepts rather than separating them

Feedback from review of earlier plans (address all of it, if any):
{feedback}"#
        )
    }

    pub const PLANNER_HUMAN: &'static str = r#"Generate the sections of the report in JSON format. The JSON must have a 'sections' key containing a list of sections. Each section must include all four fields: 'name', 'description', 'research', and 'content'. Set 'content' to an empty string ("").
Please generate the sections for the report on the given topic."#;

    /// Queries for one research section
    pub fn section_queries(section_topic: &str, number_of_queries: usize) -> String {
        format!(
            r#"You are an expert technical writer crafting targeted web search queries that will gather comprehensive information for writing a technical report section.

For context, today's date is {date}.

Topic for this section:
{section_topic}

When generating {number_of_queries} search queries, ensure they:
1. Cover different aspects of the topic (e.g., core features, real-world applications, technical architecture)
2. Include specific technical terms related to the topic
3. Target recent information by including year markers where relevant
4. Look for comparisons or differentiators from similar technologies/approaches
5. Search for both official documentation and practical implementation examples

Your queries should be specific enough to avoid generic results and technical enough to capture detailed implementation information."#,
            date = Self::current_date(),
        )
    }

    pub const SECTION_QUERIES_HUMAN: &'static str = "Generate search queries on the provided topic.";

    /// Research section writer
    pub fn section_writer(title: &str, topic: &str, context: &str, existing: &str) -> String {
        let existing = if existing.trim().is_empty() { "None" } else { existing };
        format!(
            r#"You are an expert technical writer crafting one section of a technical report.

Title for the section:
{title}

Topic for this section:
{topic}

Guidelines for writing:

1. If the existing section content is not populated, write a new section from scratch.
2. If the existing section content is populated, write a new section that synthesizes the existing section content with the new information.

Length and style:
- Strict 150-200 word limit
- No marketing language
- Technical focus
- Write in simple, clear language
- Start with your most important insight in **bold**
- Use short paragraphs (2-3 sentences max)
- Use ## for section title (Markdown format)
- Only use ONE structural element IF it helps clarify your point (a focused table or a short list)
- End with ### Sources that references the source material, formatted as `- Title : URL`

Existing section content:
{existing}

Sources:
{context}"#
        )
    }

    pub const SECTION_WRITER_HUMAN: &'static str = "Generate a report section based on the provided sources.";

    /// Section grader
    pub fn section_grader(topic: &str, section: &str) -> String {
        format!(
            r#"Review a report section relative to the specified topic:

{topic}

Section content:
{section}

Evaluate whether the section adequately covers the topic by grading it "pass" or "fail".

If the section fails, provide specific search queries to gather the missing information in "follow_up_queries"."#
        )
    }

    pub const SECTION_GRADER_HUMAN: &'static str =
        "Grade the report and consider follow-up questions for missing information:";

    /// Writer for sections that build on the research context only
    pub fn final_section_writer(title: &str, topic: &str, context: &str) -> String {
        format!(
            r#"You are an expert technical writer crafting a section that synthesizes information from the rest of the report.

Section to write:
{title}

Topic for this section:
{topic}

Available report content:
{context}

Section-specific approach:

For an Introduction:
- Use # for report title (Markdown format)
- 50-100 word limit
- Write in simple and clear language
- Focus on the core motivation for the report in 1-2 paragraphs
- No structural elements, no sources section

For a Conclusion or Summary:
- Use ## for section title (Markdown format)
- 100-150 word limit
- For comparative reports include a focused comparison table, otherwise at most one short list
- End with specific next steps or implications
- No sources section

Quality checks:
- Markdown format
- Do not include word count or any preamble in your response"#
        )
    }

    pub const FINAL_SECTION_WRITER_HUMAN: &'static str =
        "Generate a report section based on the provided sources.";

    /// Schema for query generation
    pub fn queries_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"search_query": {"type": "string"}},
                        "required": ["search_query"]
                    }
                }
            },
            "required": ["queries"]
        })
    }

    /// Schema for plan generation
    pub fn sections_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "sections": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"},
                            "research": {"type": "boolean"},
                            "content": {"type": "string"}
                        },
                        "required": ["name", "description", "research", "content"]
                    }
                }
            },
            "required": ["sections"]
        })
    }

    /// Schema for grading
    pub fn feedback_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "grade": {"type": "string", "enum": ["pass", "fail"]},
                "follow_up_queries": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"search_query": {"type": "string"}},
                        "required": ["search_query"]
                    }
                }
            },
            "required": ["grade", "follow_up_queries"]
        })
    }
}
