//! # Report Agent
//!
//! Plans a research report with an LLM, asks a human to approve the plan,
//! then researches every section on the web and writes one Markdown report.
//!
//! Every run is a *thread*: its progress is checkpointed to disk, so a plan
//! can be reviewed now and approved later from another shell.
//!
//! ## Quick Start
//! ```bash
//! report-agent start "WebAssembly component model"
//! report-agent resume --thread <ID> --feedback true
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Report workflow wiring
mod agent;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use rig_report::{CheckpointStatus, Checkpointer, ConfigOverrides, ReportNode, WorkflowEvent};

use crate::agent::{open_checkpointer, ReportAgent};
use crate::config::Config;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "report-agent",
    version = "0.1.0",
    about = "Plan, review and research long-form reports with LLMs and web search",
    long_about = r#"
Report Agent - researched reports with a human in the loop.

Each report runs as a thread:
  1. An LLM drafts a plan of sections from a first round of web searches
  2. You approve the plan ("true") or describe what to change
  3. Research sections are searched, written and graded in parallel
  4. Introduction/conclusion-style sections are written from the research
  5. The report is compiled in plan order and written to disk

PREREQUISITES:
  OPENAI_API_KEY or ANTHROPIC_API_KEY (see LLM_PROVIDER)
  TAVILY_API_KEY or PERPLEXITY_API_KEY (see SEARCH_API)

EXAMPLES:
  # Interactive: review the plan in this terminal
  report-agent start "Rust async runtimes"

  # Stop at the plan and approve it later
  report-agent start --detach --thread rt-1 "Rust async runtimes"
  report-agent resume --thread rt-1 --feedback "Add a section on io_uring"
  report-agent resume --thread rt-1 --feedback true
"#
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    report: ReportArgs,

    /// Print workflow events as JSON instead of formatted text
    #[arg(long = "json", global = true, default_value = "false")]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable verbose/debug logging",
        global = true,
        default_value = "false"
    )]
    verbose: bool,
}

/// Settings that shape the report; each one beats its environment variable
#[derive(ClapArgs, Debug, Default)]
struct ReportArgs {
    /// Search backend: tavily or perplexity (overrides SEARCH_API)
    #[arg(long = "search-api", global = true)]
    search_api: Option<String>,

    /// Queries per planning or research step (overrides NUMBER_OF_QUERIES)
    #[arg(long = "number-of-queries", global = true)]
    number_of_queries: Option<usize>,

    /// Search iterations per section (overrides MAX_SEARCH_DEPTH)
    #[arg(long = "max-search-depth", global = true)]
    max_search_depth: Option<usize>,

    /// File with report structure guidelines (overrides REPORT_STRUCTURE)
    #[arg(long = "report-structure", value_name = "FILE", global = true)]
    report_structure: Option<PathBuf>,

    /// Model name (overrides LLM_MODEL)
    #[arg(short = 'm', long = "model", global = true)]
    model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new report thread
    Start {
        /// The topic of the report
        #[arg(value_name = "TOPIC")]
        topic: String,

        /// Thread id (default: a random UUID)
        #[arg(long = "thread")]
        thread: Option<String>,

        /// Stop at the first plan review instead of prompting on stdin
        #[arg(long = "detach", default_value = "false")]
        detach: bool,
    },

    /// Answer the plan review of a suspended thread
    Resume {
        #[arg(long = "thread")]
        thread: String,

        /// "true" approves the plan; other text requests a revision
        #[arg(long = "feedback")]
        feedback: String,

        /// Do not prompt again if the plan is revised
        #[arg(long = "detach", default_value = "false")]
        detach: bool,
    },

    /// Show the checkpoint of a thread
    Show {
        #[arg(long = "thread")]
        thread: String,
    },

    /// List threads with a checkpoint
    Threads,

    /// Put a thread interrupted mid-run back at its plan review
    Recover {
        #[arg(long = "thread")]
        thread: String,

        /// Recover even if the run claimed the thread only recently
        #[arg(long = "force", default_value = "false")]
        force: bool,
    },

    /// Print the workflow as a Mermaid flowchart
    Graph,
}

impl ReportArgs {
    /// Explicit report settings; unset ones fall through to the environment
    fn overrides(&self) -> Result<ConfigOverrides> {
        let mut overrides = ConfigOverrides::new();
        if let Some(api) = &self.search_api {
            overrides = overrides.with_search_api(api.clone());
        }
        if let Some(n) = self.number_of_queries {
            overrides = overrides.with_number_of_queries(n);
        }
        if let Some(depth) = self.max_search_depth {
            overrides = overrides.with_max_search_depth(depth);
        }
        if let Some(path) = &self.report_structure {
            let structure = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read report structure from {}", path.display()))?;
            overrides = overrides.with_report_structure(structure);
        }
        Ok(overrides)
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    if let Some(model) = args.report.model.clone() {
        info!(model = %model, "Using model from command line");
        config.model = Some(model);
    }
    config.validate()?;

    let result = run(&args, &config).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
        eprintln!("\n{} {:#}", "Error:".red().bold(), e);
    }
    result
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    match &args.command {
        Command::Graph => {
            println!("{}", ReportNode::mermaid());
            Ok(())
        }

        Command::Threads => {
            for thread_id in open_checkpointer(config).list_threads().await? {
                println!("{}", thread_id);
            }
            Ok(())
        }

        Command::Show { thread } => show(config, thread, args.json).await,

        Command::Start { topic, thread, detach } => {
            let agent = ReportAgent::new(config, &args.report.overrides()?)?;
            let thread_id = thread.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            info!(thread_id = %thread_id, "Starting report thread");
            let event = agent.start(&thread_id, topic).await?;
            drive(&agent, event, *detach, args.json).await
        }

        Command::Resume { thread, feedback, detach } => {
            let agent = ReportAgent::new(config, &args.report.overrides()?)?;
            let event = agent.resume(thread, feedback.as_str()).await?;
            drive(&agent, event, *detach, args.json).await
        }

        Command::Recover { thread, force } => {
            let agent = ReportAgent::new(config, &args.report.overrides()?)?;
            let event = agent.recover(thread, *force).await?;
            print_event(&event, args.json)?;
            Ok(())
        }
    }
}

// =============================================================================
// FEEDBACK LOOP
// =============================================================================
/// Prompt on stdin until the report completes, the user detaches, or stdin
/// closes. A suspended thread stays resumable in every case.
async fn drive(agent: &ReportAgent, mut event: WorkflowEvent, detach: bool, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_event(&event, json)?;

        let thread_id = match &event {
            WorkflowEvent::Completed { .. } => return Ok(()),
            WorkflowEvent::AwaitingFeedback { thread_id, .. } => thread_id.clone(),
        };

        if detach {
            print_resume_hint(&thread_id);
            return Ok(());
        }

        eprint!("{} ", ">".green().bold());
        let Some(line) = lines.next_line().await.context("Failed to read feedback from stdin")? else {
            print_resume_hint(&thread_id);
            return Ok(());
        };

        event = agent.resume(&thread_id, line).await?;
    }
}

fn print_resume_hint(thread_id: &str) {
    eprintln!(
        "\nThread {} is waiting for feedback. Continue with:\n  report-agent resume --thread {} --feedback <TEXT|true>",
        thread_id.bold(),
        thread_id
    );
}

fn print_event(event: &WorkflowEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(event)?);
        return Ok(());
    }

    match event {
        WorkflowEvent::AwaitingFeedback { thread_id, prompt, .. } => {
            println!("\n{} {}", "REPORT PLAN".cyan().bold(), format!("[{}]", thread_id).dimmed());
            println!("{}", "=".repeat(60));
            println!("{}", prompt);
        }
        WorkflowEvent::Completed { thread_id, report } => {
            println!("\n{}", "=".repeat(60));
            println!("{} {}", "FINAL REPORT".green().bold(), format!("[{}]", thread_id).dimmed());
            println!("{}\n", "=".repeat(60));
            println!("{}", report);
            println!("\n{}", "=".repeat(60));
        }
    }
    Ok(())
}

async fn show(config: &Config, thread_id: &str, json: bool) -> Result<()> {
    let checkpoint = open_checkpointer(config)
        .load(thread_id)
        .await?
        .with_context(|| format!("No checkpoint for thread {}", thread_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        return Ok(());
    }

    println!("{} {}", "Thread:".bold(), checkpoint.thread_id);
    println!("{} {}", "Topic:".bold(), checkpoint.state.topic);
    println!("{} {}", "Status:".bold(), checkpoint.status);
    println!("{} {}", "Node:".bold(), checkpoint.cursor);
    println!("{} {}", "Saved:".bold(), checkpoint.timestamp.to_rfc3339());
    println!("{} {}", "Revisions:".bold(), checkpoint.state.feedback_on_plan.len());

    match checkpoint.status {
        CheckpointStatus::Completed => {
            println!("\n{}", checkpoint.state.final_report);
        }
        CheckpointStatus::Suspended | CheckpointStatus::Resumed => {
            if let Some(prompt) = &checkpoint.prompt {
                println!("\n{}", prompt);
            }
        }
    }
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber for structured logging.
///
/// Logs go to stderr so stdout carries only the plan and the report.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_parsing() {
        let args = Args::parse_from(["test", "start", "Rust async runtimes"]);
        match args.command {
            Command::Start { topic, thread, detach } => {
                assert_eq!(topic, "Rust async runtimes");
                assert!(thread.is_none());
                assert!(!detach);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(!args.verbose);
    }

    #[test]
    fn test_resume_with_global_flags() {
        let args = Args::parse_from([
            "test",
            "resume",
            "--thread",
            "rt-1",
            "--feedback",
            "true",
            "--max-search-depth",
            "3",
            "--search-api",
            "perplexity",
            "--verbose",
        ]);

        match &args.command {
            Command::Resume { thread, feedback, .. } => {
                assert_eq!(thread, "rt-1");
                assert_eq!(feedback, "true");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(args.verbose);
        assert_eq!(args.report.max_search_depth, Some(3));

        let overrides = args.report.overrides().unwrap();
        assert_eq!(overrides.max_search_depth, Some(3));
        assert_eq!(overrides.search_api.as_deref(), Some("perplexity"));
        assert!(overrides.number_of_queries.is_none());
    }

    #[test]
    fn test_report_structure_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("structure.md");
        std::fs::write(&path, "1. Intro\n2. Body\n3. Conclusion").unwrap();

        let report = ReportArgs { report_structure: Some(path), ..ReportArgs::default() };
        let overrides = report.overrides().unwrap();
        assert_eq!(overrides.report_structure.as_deref(), Some("1. Intro\n2. Body\n3. Conclusion"));

        let missing = ReportArgs {
            report_structure: Some(dir.path().join("missing.md")),
            ..ReportArgs::default()
        };
        assert!(missing.overrides().is_err());
    }

    #[test]
    fn test_recover_force_flag() {
        let args = Args::parse_from(["test", "recover", "--thread", "t1"]);
        assert!(matches!(args.command, Command::Recover { ref thread, force: false } if thread == "t1"));

        let args = Args::parse_from(["test", "recover", "--thread", "t1", "--force"]);
        assert!(matches!(args.command, Command::Recover { force: true, .. }));
    }

    #[test]
    fn test_graph_command() {
        let args = Args::parse_from(["test", "graph"]);
        assert!(matches!(args.command, Command::Graph));
    }
}
