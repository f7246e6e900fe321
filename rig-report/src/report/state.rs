//! Report and section data model

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// A named unit of the final report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    /// Unique within a plan; the compiler looks sections up by name
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Whether the section needs web research
    #[serde(alias = "requires_research")]
    pub research: bool,
    #[serde(default)]
    pub content: String,
}

impl Section {
    /// An empty-content stub as produced by plan generation
    pub fn new(name: impl Into<String>, description: impl Into<String>, research: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            research,
            content: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// Structured plan output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sections {
    pub sections: Vec<Section>,
}

/// Drop sections whose name was already used, keeping the first.
pub fn dedup_section_names(sections: Vec<Section>) -> Vec<Section> {
    let mut seen = HashSet::new();
    sections
        .into_iter()
        .filter(|s| {
            let fresh = seen.insert(s.name.clone());
            if !fresh {
                warn!(section = %s.name, "Dropping duplicate section name from plan");
            }
            fresh
        })
        .collect()
}

/// A web search query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    #[serde(rename = "search_query", alias = "text")]
    pub text: String,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Structured query-generation output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Queries {
    #[serde(default)]
    pub queries: Vec<SearchQuery>,
}

impl Queries {
    /// Non-blank query strings, at most `limit` of them
    pub fn into_texts(self, limit: usize) -> Vec<String> {
        self.queries
            .into_iter()
            .map(|q| q.text.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(limit)
            .collect()
    }
}

/// Section grading outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Pass,
    Fail,
}

/// Structured grader output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feedback {
    pub grade: Grade,
    #[serde(default)]
    pub follow_up_queries: Vec<SearchQuery>,
}

impl Feedback {
    /// Fallback when grading fails: forces a retry or forced termination
    pub fn fail() -> Self {
        Self { grade: Grade::Fail, follow_up_queries: Vec::new() }
    }

    pub fn is_pass(&self) -> bool {
        self.grade == Grade::Pass
    }
}

/// Top-level workflow state, the unit persisted in checkpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportState {
    pub topic: String,
    /// Every revision request received so far, oldest first
    #[serde(default)]
    pub feedback_on_plan: Vec<String>,
    /// The current plan
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Written sections in completion order
    #[serde(default)]
    pub completed_sections: Vec<Section>,
    /// Research sections rendered as context for the final writers
    #[serde(default)]
    pub research_context: String,
    #[serde(default)]
    pub final_report: String,
}

impl ReportState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), ..Default::default() }
    }

    /// Sections that go through the research loop
    pub fn research_sections(&self) -> Vec<Section> {
        self.sections.iter().filter(|s| s.research).cloned().collect()
    }

    /// Sections written from the gathered research context
    pub fn final_sections(&self) -> Vec<Section> {
        self.sections.iter().filter(|s| !s.research).cloned().collect()
    }

    /// Append completed sections, keeping only the latest entry per name
    pub fn merge_completed(&mut self, sections: Vec<Section>) {
        for section in sections {
            self.completed_sections.retain(|s| s.name != section.name);
            self.completed_sections.push(section);
        }
    }

    /// Completed sections re-ordered by the plan
    pub fn completed_in_plan_order(&self) -> Vec<&Section> {
        self.sections
            .iter()
            .filter_map(|planned| self.completed_sections.iter().rev().find(|c| c.name == planned.name))
            .collect()
    }
}
