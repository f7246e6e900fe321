//! Scripted LLM and search providers for workflow tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rig_report::llm::{last_user_prompt, LLMConfig, LLMProvider, LLMResponse, Message, Role};
use rig_report::report::ReportPrompts;
use rig_report::search::{SearchProvider, SearchResponse, SourceDocument};
use rig_report::{ReportConfig, ReportContext, ReportError, RuntimeOptions, SearchError};

/// Plan returned by the scripted planner
pub const PLAN_JSON: &str = r#"```json
{
  "sections": [
    {"name": "Introduction", "description": "Why async runtimes matter", "research": false, "content": ""},
    {"name": "Executors", "description": "Work-stealing schedulers", "research": true, "content": ""},
    {"name": "IO Drivers", "description": "epoll, kqueue and io_uring", "research": true, "content": ""},
    {"name": "Conclusion", "description": "Choosing a runtime", "research": false, "content": ""}
  ]
}
```"#;

/// LLM that answers each prompt kind with canned output
#[derive(Default)]
pub struct ScriptedLlm {
    /// Grade every section "fail" with follow-up queries
    pub always_fail_grade: bool,
    /// Delay applied to every call
    pub delay: Option<Duration>,
    /// Planner output replacing `PLAN_JSON`
    pub plan: Option<String>,
    pub planner_calls: AtomicUsize,
    pub grader_calls: AtomicUsize,
    pub section_writer_calls: AtomicUsize,
    pub final_writer_calls: AtomicUsize,
    /// System prompts seen by the planner, in call order
    pub planner_prompts: Mutex<Vec<String>>,
    /// Context passed to final section writers
    pub final_writer_prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_grades() -> Self {
        Self { always_fail_grade: true, ..Self::default() }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn with_plan(plan: impl Into<String>) -> Self {
        Self { plan: Some(plan.into()), ..Self::default() }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// The line following `marker` in `text`
fn line_after<'a>(text: &'a str, marker: &str) -> &'a str {
    text.split_once(marker)
        .and_then(|(_, rest)| rest.trim_start_matches('\n').lines().next())
        .unwrap_or("unknown")
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn complete(&self, messages: &[Message], _config: Option<&LLMConfig>) -> Result<LLMResponse, ReportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let human = last_user_prompt(messages);

        let reply = if human == ReportPrompts::PLANNER_QUERIES_HUMAN || human == ReportPrompts::SECTION_QUERIES_HUMAN {
            r#"{"queries": [{"search_query": "tokio scheduler"}, {"search_query": "async-std design"}]}"#.to_string()
        } else if human == ReportPrompts::PLANNER_HUMAN {
            self.planner_calls.fetch_add(1, Ordering::SeqCst);
            self.planner_prompts.lock().unwrap().push(system.clone());
            self.plan.clone().unwrap_or_else(|| PLAN_JSON.to_string())
        } else if human == ReportPrompts::SECTION_GRADER_HUMAN {
            self.grader_calls.fetch_add(1, Ordering::SeqCst);
            if self.always_fail_grade {
                r#"{"grade": "fail", "follow_up_queries": [{"search_query": "more detail"}]}"#.to_string()
            } else {
                r#"{"grade": "pass", "follow_up_queries": []}"#.to_string()
            }
        } else if system.contains("Section to write:") {
            self.final_writer_calls.fetch_add(1, Ordering::SeqCst);
            self.final_writer_prompts.lock().unwrap().push(system.clone());
            format!("## {}\n\nSynthesized.", line_after(&system, "Section to write:"))
        } else if system.contains("Title for the section:") {
            self.section_writer_calls.fetch_add(1, Ordering::SeqCst);
            format!("## {}\n\nResearched.", line_after(&system, "Title for the section:"))
        } else {
            return Err(ReportError::Llm(format!("unexpected prompt: {}", human)));
        };

        Ok(LLMResponse::new(Message::assistant(&reply)))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }
}

/// Search provider returning one document per query
#[derive(Default)]
pub struct CountingSearch {
    pub calls: AtomicUsize,
}

impl CountingSearch {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for CountingSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SearchResponse {
            query: query.to_string(),
            results: vec![SourceDocument {
                title: format!("Result for {}", query),
                url: format!("https://example.com/{}", n),
                content: format!("Snippet about {}", query),
                raw_content: None,
                score: 0.9,
            }],
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Context over the scripted providers writing the report under `dir`
pub fn context(llm: Arc<ScriptedLlm>, search: Arc<CountingSearch>, config: ReportConfig, dir: &Path) -> ReportContext {
    let options = RuntimeOptions::new()
        .with_llm_timeout(Duration::from_secs(5))
        .with_parallelism(2)
        .with_output_path(dir.join("final_report.md"));
    ReportContext::new(llm, search, config, options)
}
