//! End-to-end tests for the report workflow over scripted providers
//!
//! - plan review loop (revise, re-prompt, approve)
//! - research fan-out bounded by search depth
//! - final writers reading the research context
//! - compiled report order and persistence

mod support;

use std::sync::Arc;

use rig_report::{
    create_checkpointer, CheckpointStatus, CheckpointerConfig, ReportConfig, ReportError, ReportNode, ReportWorkflow,
    WorkflowEvent, MISSING_SECTION_PLACEHOLDER,
};
use support::{context, CountingSearch, ScriptedLlm};
use tempfile::tempdir;

fn workflow(llm: Arc<ScriptedLlm>, search: Arc<CountingSearch>, config: ReportConfig, dir: &std::path::Path) -> ReportWorkflow {
    ReportWorkflow::new(context(llm, search, config, dir), create_checkpointer(CheckpointerConfig::Memory))
}

// =============================================================================
// Plan Review
// =============================================================================

#[tokio::test]
async fn test_start_suspends_with_plan() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let search = Arc::new(CountingSearch::default());
    let wf = workflow(llm.clone(), search.clone(), ReportConfig::default(), dir.path());

    let event = wf.start("plan-1", "Rust async runtimes").await.unwrap();

    match event {
        WorkflowEvent::AwaitingFeedback { thread_id, prompt, state } => {
            assert_eq!(thread_id, "plan-1");
            assert!(prompt.contains("Section: Executors\nDescription: Work-stealing schedulers\nResearch needed: Yes"));
            assert!(prompt.contains("Enter 'true' to approve"));
            assert_eq!(state.sections.len(), 4);
            assert!(state.sections.iter().all(|s| s.content.is_empty()));
            assert!(state.completed_sections.is_empty());
        }
        other => panic!("expected suspension, got {:?}", other),
    }

    assert_eq!(ScriptedLlm::count(&llm.planner_calls), 1);
    // planning searches only; no section research yet
    assert_eq!(search.calls(), 2);
    assert_eq!(ScriptedLlm::count(&llm.grader_calls), 0);

    let checkpoint = wf.snapshot("plan-1").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, CheckpointStatus::Suspended);
    assert_eq!(checkpoint.cursor, ReportNode::HumanFeedback);
}

#[tokio::test]
async fn test_revisions_accumulate_without_fan_out() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let search = Arc::new(CountingSearch::default());
    let wf = workflow(llm.clone(), search.clone(), ReportConfig::default(), dir.path());

    wf.start("revise", "Rust async runtimes").await.unwrap();
    let event = wf.resume("revise", "Add a section on embedded executors").await.unwrap();
    assert!(!event.is_completed());
    let event = wf.resume("revise", "Drop the conclusion").await.unwrap();

    let WorkflowEvent::AwaitingFeedback { state, .. } = event else {
        panic!("expected suspension");
    };
    assert_eq!(
        state.feedback_on_plan,
        vec!["Add a section on embedded executors", "Drop the conclusion"]
    );

    assert_eq!(ScriptedLlm::count(&llm.planner_calls), 3);
    let prompts = llm.planner_prompts.lock().unwrap();
    assert!(prompts[0].contains("None"));
    assert!(prompts[2].contains("1. Add a section on embedded executors\n2. Drop the conclusion"));

    assert_eq!(ScriptedLlm::count(&llm.section_writer_calls), 0);
    assert_eq!(ScriptedLlm::count(&llm.final_writer_calls), 0);
    assert!(!dir.path().join("final_report.md").exists());
}

#[tokio::test]
async fn test_blank_feedback_reprompts_without_replanning() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let search = Arc::new(CountingSearch::default());
    let wf = workflow(llm.clone(), search, ReportConfig::default(), dir.path());

    let first = wf.start("blank", "Rust async runtimes").await.unwrap();
    let second = wf.resume("blank", "   ").await.unwrap();
    let third = wf.resume("blank", false).await.unwrap();

    let prompt_of = |event: &WorkflowEvent| match event {
        WorkflowEvent::AwaitingFeedback { prompt, .. } => prompt.clone(),
        other => panic!("expected suspension, got {:?}", other),
    };
    assert_eq!(prompt_of(&first), prompt_of(&second));
    assert_eq!(prompt_of(&first), prompt_of(&third));
    assert_eq!(ScriptedLlm::count(&llm.planner_calls), 1);

    let checkpoint = wf.snapshot("blank").await.unwrap().unwrap();
    assert!(checkpoint.is_suspended());
    assert!(checkpoint.state.feedback_on_plan.is_empty());
}

// =============================================================================
// Research and Compilation
// =============================================================================

#[tokio::test]
async fn test_approval_compiles_report_in_plan_order() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let search = Arc::new(CountingSearch::default());
    let wf = workflow(llm.clone(), search, ReportConfig::default(), dir.path());

    wf.start("full", "Rust async runtimes").await.unwrap();
    let event = wf.resume("full", "TRUE").await.unwrap();

    let WorkflowEvent::Completed { thread_id, report } = event else {
        panic!("expected completion");
    };
    assert_eq!(thread_id, "full");
    assert_eq!(
        report,
        "## Introduction\n\nSynthesized.\n\n\
         ## Executors\n\nResearched.\n\n\
         ## IO Drivers\n\nResearched.\n\n\
         ## Conclusion\n\nSynthesized."
    );
    assert!(!report.contains(MISSING_SECTION_PLACEHOLDER));

    // grades pass on the first try
    assert_eq!(ScriptedLlm::count(&llm.grader_calls), 2);
    assert_eq!(ScriptedLlm::count(&llm.section_writer_calls), 2);
    assert_eq!(ScriptedLlm::count(&llm.final_writer_calls), 2);

    let written = std::fs::read_to_string(dir.path().join("final_report.md")).unwrap();
    assert_eq!(written, report);

    let checkpoint = wf.snapshot("full").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, CheckpointStatus::Completed);
    assert_eq!(checkpoint.cursor, ReportNode::End);
    assert_eq!(checkpoint.state.final_report, report);
    assert_eq!(checkpoint.state.completed_sections.len(), 4);
}

#[tokio::test]
async fn test_two_section_round_trip() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::with_plan(
        r#"{"sections": [
            {"name": "Overview", "description": "What it is", "research": false, "content": ""},
            {"name": "Internals", "description": "How it works", "research": true, "content": ""}
        ]}"#,
    ));
    let wf = workflow(llm, Arc::new(CountingSearch::default()), ReportConfig::default(), dir.path());

    wf.start("pair", "Rust async runtimes").await.unwrap();
    let event = wf.resume("pair", "true").await.unwrap();

    let WorkflowEvent::Completed { report, .. } = event else {
        panic!("expected completion");
    };
    assert_eq!(report, "## Overview\n\nSynthesized.\n\n## Internals\n\nResearched.");

    let checkpoint = wf.snapshot("pair").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.completed_sections.len(), 2);
    assert!(checkpoint
        .state
        .completed_sections
        .iter()
        .all(|s| !s.content.is_empty() && s.content != MISSING_SECTION_PLACEHOLDER));
}

#[tokio::test]
async fn test_unparseable_plan_yields_empty_report() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::with_plan("I cannot produce a plan right now."));
    let wf = workflow(llm.clone(), Arc::new(CountingSearch::default()), ReportConfig::default(), dir.path());

    let event = wf.start("empty", "Rust async runtimes").await.unwrap();
    let WorkflowEvent::AwaitingFeedback { state, .. } = event else {
        panic!("expected suspension");
    };
    assert!(state.sections.is_empty());

    let event = wf.resume("empty", true).await.unwrap();
    assert_eq!(event, WorkflowEvent::Completed { thread_id: "empty".into(), report: String::new() });
    assert_eq!(ScriptedLlm::count(&llm.grader_calls), 0);
}

#[tokio::test]
async fn test_final_writers_see_research_context() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let search = Arc::new(CountingSearch::default());
    let wf = workflow(llm.clone(), search, ReportConfig::default(), dir.path());

    wf.start("context", "Rust async runtimes").await.unwrap();
    wf.resume("context", true).await.unwrap();

    let prompts = llm.final_writer_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    for prompt in prompts.iter() {
        let executors = prompt.find("Section 1: Executors").unwrap();
        let io = prompt.find("Section 2: IO Drivers").unwrap();
        assert!(executors < io);
        assert!(prompt.contains("## Executors\n\nResearched."));
        // non-research sections are not part of the context
        assert!(!prompt.contains("Section 3:"));
    }
}

#[tokio::test]
async fn test_failing_grades_stop_at_max_depth() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::failing_grades());
    let search = Arc::new(CountingSearch::default());
    let config = ReportConfig { max_search_depth: 3, ..ReportConfig::default() };
    let wf = workflow(llm.clone(), search.clone(), config, dir.path());

    wf.start("depth", "Rust async runtimes").await.unwrap();
    let planning_searches = search.calls();
    let event = wf.resume("depth", true).await.unwrap();
    assert!(event.is_completed());

    // two research sections, each graded once per iteration
    assert_eq!(ScriptedLlm::count(&llm.grader_calls), 2 * 3);
    assert_eq!(ScriptedLlm::count(&llm.section_writer_calls), 2 * 3);
    // first pass runs two generated queries, retries run one follow-up each
    assert_eq!(search.calls() - planning_searches, 2 * (2 + 1 + 1));
}

// =============================================================================
// Thread Lifecycle
// =============================================================================

#[tokio::test]
async fn test_resume_after_completion_is_rejected() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let wf = workflow(llm, Arc::new(CountingSearch::default()), ReportConfig::default(), dir.path());

    wf.start("done", "Rust async runtimes").await.unwrap();
    wf.resume("done", true).await.unwrap();

    let err = wf.resume("done", true).await.unwrap_err();
    assert!(matches!(err, ReportError::NotSuspended { ref status, .. } if status == "completed"));
}

#[tokio::test]
async fn test_thread_ids_are_checked() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let wf = workflow(llm, Arc::new(CountingSearch::default()), ReportConfig::default(), dir.path());

    wf.start("taken", "Rust async runtimes").await.unwrap();
    let err = wf.start("taken", "Another topic").await.unwrap_err();
    assert!(matches!(err, ReportError::ThreadExists(_)));

    let err = wf.resume("missing", true).await.unwrap_err();
    assert!(matches!(err, ReportError::UnknownThread(_)));

    let err = wf.start("../escape", "topic").await.unwrap_err();
    assert!(matches!(err, ReportError::InvalidThreadId(_)));

    let err = wf.start("blank-topic", "  ").await.unwrap_err();
    assert!(matches!(err, ReportError::Config(_)));
}

#[tokio::test]
async fn test_threads_are_independent() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let wf = workflow(llm, Arc::new(CountingSearch::default()), ReportConfig::default(), dir.path());

    wf.start("a", "Topic A").await.unwrap();
    wf.start("b", "Topic B").await.unwrap();
    wf.resume("a", "More depth please").await.unwrap();

    let a = wf.snapshot("a").await.unwrap().unwrap();
    let b = wf.snapshot("b").await.unwrap().unwrap();
    assert_eq!(a.state.topic, "Topic A");
    assert_eq!(a.state.feedback_on_plan.len(), 1);
    assert_eq!(b.state.topic, "Topic B");
    assert!(b.state.feedback_on_plan.is_empty());
}
