//! Report workflow interpreter
//!
//! Drives `ReportNode`s from a cursor until the workflow either suspends for
//! plan feedback or compiles the report. Every suspension and the final
//! result are written to the checkpointer under the caller's thread id, so a
//! later `resume` (possibly from another process) continues where it left off.
//!
//! ```ignore
//! let workflow = ReportWorkflow::new(ctx, checkpointer);
//! let event = workflow.start("thread-1", "Rust async runtimes").await?;
//! // show the plan, collect feedback ...
//! let event = workflow.resume("thread-1", true).await?;
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use super::fanout::fan_out;
use super::node::ReportNode;
use crate::checkpoint::{validate_thread_id, Checkpoint, CheckpointStatus, Checkpointer};
use crate::error::ReportError;
use crate::report::{
    compile_report, format_sections, generate_plan, persist_report, render_feedback_prompt, route_feedback,
    run_section, write_final_section, FeedbackInput, FeedbackRoute, ReportContext, ReportState,
};

/// What the caller sees when a run stops
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Suspended at the plan review; resume with feedback
    AwaitingFeedback {
        thread_id: String,
        prompt: String,
        state: ReportState,
    },

    /// The report was compiled and written
    Completed { thread_id: String, report: String },
}

impl WorkflowEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            WorkflowEvent::AwaitingFeedback { thread_id, .. } | WorkflowEvent::Completed { thread_id, .. } => {
                thread_id
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowEvent::Completed { .. })
    }
}

/// In-process claims; an entry lives only while a run holds it
#[derive(Default)]
struct ThreadLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(&self, thread_id: &str) -> Result<ThreadClaim<'_>, ReportError> {
        let mut locks = self.map();
        let lock = Arc::clone(locks.entry(thread_id.to_string()).or_default());
        let guard = lock
            .try_lock_owned()
            .map_err(|_| ReportError::ThreadBusy(thread_id.to_string()))?;
        Ok(ThreadClaim {
            owner: self,
            thread_id: thread_id.to_string(),
            guard: Some(guard),
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

struct ThreadClaim<'a> {
    owner: &'a ThreadLocks,
    thread_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadClaim<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.owner.map();
        if locks.get(&self.thread_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.thread_id);
        }
    }
}

/// Checkpointed report workflow
pub struct ReportWorkflow {
    ctx: Arc<ReportContext>,
    checkpointer: Arc<dyn Checkpointer>,
    /// Only one run advances a thread at a time within this process; the
    /// checkpointer's compare-and-save covers other processes
    thread_locks: ThreadLocks,
}

impl ReportWorkflow {
    pub fn new(ctx: ReportContext, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            checkpointer,
            thread_locks: ThreadLocks::default(),
        }
    }

    pub fn context(&self) -> &ReportContext {
        &self.ctx
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Begin a new report for `topic` under a fresh thread id.
    ///
    /// Runs plan generation and returns at the first feedback suspension.
    pub async fn start(&self, thread_id: &str, topic: &str) -> Result<WorkflowEvent, ReportError> {
        validate_thread_id(thread_id)?;
        if topic.trim().is_empty() {
            return Err(ReportError::config("topic must not be empty"));
        }
        let _claim = self.thread_locks.claim(thread_id)?;

        if self.checkpointer.load(thread_id).await?.is_some() {
            return Err(ReportError::ThreadExists(thread_id.to_string()));
        }

        info!(thread_id, topic, "Starting report workflow");
        self.run(thread_id, ReportState::new(topic.trim()), ReportNode::GeneratePlan, None)
            .await
    }

    /// Continue a suspended thread with plan feedback.
    ///
    /// `true` or `"true"` approves the plan, other text revises it, and blank
    /// text or `false` re-suspends with the same plan.
    pub async fn resume(
        &self,
        thread_id: &str,
        feedback: impl Into<FeedbackInput>,
    ) -> Result<WorkflowEvent, ReportError> {
        validate_thread_id(thread_id)?;
        let feedback = feedback.into();
        let _claim = self.thread_locks.claim(thread_id)?;

        let checkpoint = self.load_existing(thread_id).await?;
        if !checkpoint.is_suspended() {
            return Err(ReportError::NotSuspended {
                thread_id: thread_id.to_string(),
                status: checkpoint.status.to_string(),
            });
        }

        // Claim the checkpoint so a crashed run is visible as Resumed; only
        // one claimant can move it off this sequence
        let sequence = checkpoint.sequence + 1;
        let mut claimed = Checkpoint::new(
            thread_id,
            sequence,
            checkpoint.cursor,
            CheckpointStatus::Resumed,
            checkpoint.state.clone(),
        )
        .with_metadata("feedback", serde_json::to_string(&feedback)?)
        .with_metadata("claimed_by_pid", std::process::id().to_string());
        claimed.prompt = checkpoint.prompt.clone();
        self.checkpointer
            .compare_and_save(&claimed, Some(checkpoint.sequence))
            .await?;

        let mut state = checkpoint.state;
        let route = route_feedback(&feedback);
        match &route {
            FeedbackRoute::Approve => info!(thread_id, "Plan approved"),
            FeedbackRoute::Revise(text) => {
                info!(thread_id, feedback = %text, "Plan revision requested");
                state.feedback_on_plan.push(text.clone());
            }
            FeedbackRoute::Reprompt => debug!(thread_id, "Empty feedback, asking again"),
        }

        let next = checkpoint.cursor.next(Some(&route));
        self.run(thread_id, state, next, Some(sequence)).await
    }

    /// Current checkpoint of a thread, without consuming it
    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<Checkpoint>, ReportError> {
        validate_thread_id(thread_id)?;
        self.checkpointer.load(thread_id).await
    }

    /// Return a thread left `Resumed` by a crashed run to its suspension.
    ///
    /// A claim younger than `RuntimeOptions::stale_claim_after` may belong to
    /// a run that is still going, so it is refused with `ThreadBusy` unless
    /// `force` is set. Suspended threads just report their pending prompt
    /// again.
    pub async fn recover(&self, thread_id: &str, force: bool) -> Result<WorkflowEvent, ReportError> {
        validate_thread_id(thread_id)?;
        let _claim = self.thread_locks.claim(thread_id)?;

        let checkpoint = self.load_existing(thread_id).await?;
        let prompt = checkpoint
            .prompt
            .clone()
            .unwrap_or_else(|| render_feedback_prompt(&checkpoint.state.sections));

        match checkpoint.status {
            CheckpointStatus::Suspended => Ok(WorkflowEvent::AwaitingFeedback {
                thread_id: thread_id.to_string(),
                prompt,
                state: checkpoint.state,
            }),
            CheckpointStatus::Resumed => {
                let age = (Utc::now() - checkpoint.timestamp).to_std().unwrap_or_default();
                let claimed_by = checkpoint.metadata.get("claimed_by_pid").map(String::as_str);
                if !force && age < self.ctx.options.stale_claim_after {
                    warn!(thread_id, ?age, ?claimed_by, "Claim is recent, refusing to recover");
                    return Err(ReportError::ThreadBusy(thread_id.to_string()));
                }

                warn!(
                    thread_id,
                    sequence = checkpoint.sequence,
                    ?age,
                    ?claimed_by,
                    force,
                    "Recovering interrupted thread"
                );
                let restored = Checkpoint::new(
                    thread_id,
                    checkpoint.sequence + 1,
                    checkpoint.cursor,
                    CheckpointStatus::Suspended,
                    checkpoint.state.clone(),
                )
                .with_prompt(prompt.clone());
                self.checkpointer
                    .compare_and_save(&restored, Some(checkpoint.sequence))
                    .await?;
                Ok(WorkflowEvent::AwaitingFeedback {
                    thread_id: thread_id.to_string(),
                    prompt,
                    state: checkpoint.state,
                })
            }
            CheckpointStatus::Completed => Err(ReportError::NotSuspended {
                thread_id: thread_id.to_string(),
                status: checkpoint.status.to_string(),
            }),
        }
    }

    /// Mermaid flowchart of the pipeline
    pub fn mermaid(&self) -> String {
        ReportNode::mermaid()
    }

    async fn load_existing(&self, thread_id: &str) -> Result<Checkpoint, ReportError> {
        self.checkpointer
            .load(thread_id)
            .await?
            .ok_or_else(|| ReportError::UnknownThread(thread_id.to_string()))
    }

    /// `last_saved` is the sequence this run last wrote, `None` for a new
    /// thread; every save is conditional on it.
    async fn run(
        &self,
        thread_id: &str,
        mut state: ReportState,
        mut node: ReportNode,
        last_saved: Option<u64>,
    ) -> Result<WorkflowEvent, ReportError> {
        let parallelism = self.ctx.options.parallelism;

        loop {
            debug!(thread_id, node = %node, "Entering node");
            match node {
                ReportNode::GeneratePlan => {
                    state.sections = generate_plan(&self.ctx, &state.topic, &state.feedback_on_plan).await;
                    // A new plan invalidates anything written for an older one
                    state.completed_sections.clear();
                    state.research_context.clear();
                }

                ReportNode::HumanFeedback => {
                    let prompt = render_feedback_prompt(&state.sections);
                    let checkpoint = Checkpoint::new(
                        thread_id,
                        next_sequence(last_saved),
                        ReportNode::HumanFeedback,
                        CheckpointStatus::Suspended,
                        state.clone(),
                    )
                    .with_prompt(prompt.clone());
                    self.checkpointer.compare_and_save(&checkpoint, last_saved).await?;

                    info!(thread_id, sections = state.sections.len(), "Awaiting plan feedback");
                    return Ok(WorkflowEvent::AwaitingFeedback {
                        thread_id: thread_id.to_string(),
                        prompt,
                        state,
                    });
                }

                ReportNode::ResearchSections => {
                    let sections = state.research_sections();
                    info!(thread_id, count = sections.len(), "Researching sections");
                    let ctx = Arc::clone(&self.ctx);
                    let completed = fan_out(sections, parallelism, move |section| {
                        let ctx = Arc::clone(&ctx);
                        async move { run_section(&ctx, section).await }
                    })
                    .await;
                    state.merge_completed(completed);
                }

                ReportNode::GatherCompleted => {
                    state.research_context = format_sections(&state.completed_in_plan_order());
                }

                ReportNode::WriteFinalSections => {
                    let sections = state.final_sections();
                    info!(thread_id, count = sections.len(), "Writing final sections");
                    let ctx = Arc::clone(&self.ctx);
                    let research_context = Arc::new(state.research_context.clone());
                    let completed = fan_out(sections, parallelism, move |section| {
                        let ctx = Arc::clone(&ctx);
                        let research_context = Arc::clone(&research_context);
                        async move { write_final_section(&ctx, section, &research_context).await }
                    })
                    .await;
                    state.merge_completed(completed);
                }

                ReportNode::CompileReport => {
                    let report = compile_report(&state.sections, &state.completed_sections);
                    state.final_report = report.clone();

                    let output_path = &self.ctx.options.output_path;
                    let mut checkpoint = Checkpoint::new(
                        thread_id,
                        next_sequence(last_saved),
                        ReportNode::End,
                        CheckpointStatus::Completed,
                        state,
                    )
                    .with_metadata("output_path", output_path.display().to_string());

                    // The report stays in the checkpoint even when the file cannot be written
                    if let Err(e) = persist_report(output_path, &report).await {
                        error!(thread_id, path = %output_path.display(), error = %e, "Failed to write final report");
                        checkpoint = checkpoint.with_metadata("output_error", e.to_string());
                    }
                    self.checkpointer.compare_and_save(&checkpoint, last_saved).await?;

                    info!(thread_id, bytes = report.len(), "Report workflow complete");
                    return Ok(WorkflowEvent::Completed {
                        thread_id: thread_id.to_string(),
                        report,
                    });
                }

                ReportNode::End => {
                    return Ok(WorkflowEvent::Completed {
                        thread_id: thread_id.to_string(),
                        report: state.final_report,
                    });
                }
            }
            node = node.next(None);
        }
    }
}

fn next_sequence(last_saved: Option<u64>) -> u64 {
    last_saved.map_or(1, |sequence| sequence + 1)
}
