//! Checkpoint stores for suspend/resume
//!
//! A checkpoint is a serializable continuation: the workflow state, the node
//! to re-enter and the prompt shown to the human, keyed by thread id.
//!
//! ```ignore
//! let checkpointer = create_checkpointer(CheckpointerConfig::File {
//!     path: PathBuf::from("./checkpoints"),
//!     compression: true,
//! });
//! checkpointer.save(&checkpoint).await?;
//! let restored = checkpointer.load("thread-1").await?;
//! ```

mod file;

pub use file::FileCheckpointer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ReportError;
use crate::report::ReportState;
use crate::workflow::ReportNode;

/// Lifecycle of a thread's checkpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// Waiting for human input at `cursor`
    Suspended,
    /// A resume has claimed this checkpoint and is running
    Resumed,
    /// The report has been compiled
    Completed,
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckpointStatus::Suspended => "suspended",
            CheckpointStatus::Resumed => "resumed",
            CheckpointStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Persisted snapshot of one workflow thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub thread_id: String,

    /// Increases on every save for this thread
    pub sequence: u64,

    /// Node to re-enter on resume
    pub cursor: ReportNode,

    pub status: CheckpointStatus,

    pub state: ReportState,

    /// Text shown to the human while suspended
    #[serde(default)]
    pub prompt: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        sequence: u64,
        cursor: ReportNode,
        status: CheckpointStatus,
        state: ReportState,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            sequence,
            cursor,
            status,
            state,
            prompt: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_suspended(&self) -> bool {
        self.status == CheckpointStatus::Suspended
    }
}

/// Thread ids double as file names, so they are restricted to
/// ASCII alphanumerics, `-` and `_`.
pub fn validate_thread_id(thread_id: &str) -> Result<(), ReportError> {
    let valid = !thread_id.is_empty()
        && thread_id.len() <= 128
        && thread_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ReportError::InvalidThreadId(thread_id.to_string()))
    }
}

/// Keyed checkpoint storage; one live checkpoint per thread
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Save, replacing any previous checkpoint of the same thread.
    ///
    /// Implementations should ensure atomic writes to prevent corruption.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ReportError>;

    /// Save only if the stored checkpoint still has sequence `expected`
    /// (`None`: no checkpoint may exist yet). The check and the write are
    /// one atomic step for every user of the store.
    ///
    /// Fails with `ReportError::ThreadBusy` when another writer moved the
    /// thread first.
    async fn compare_and_save(&self, checkpoint: &Checkpoint, expected: Option<u64>) -> Result<(), ReportError>;

    /// Load the checkpoint of a thread. Reading never consumes it.
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, ReportError>;

    async fn delete(&self, thread_id: &str) -> Result<(), ReportError>;

    /// All thread ids with a checkpoint, sorted
    async fn list_threads(&self) -> Result<Vec<String>, ReportError>;

    /// Delete every checkpoint
    async fn clear(&self) -> Result<(), ReportError> {
        for thread_id in self.list_threads().await? {
            self.delete(&thread_id).await?;
        }
        Ok(())
    }
}

/// Configuration for creating checkpointers
#[derive(Debug, Clone, Default)]
pub enum CheckpointerConfig {
    /// In-memory, single process only
    #[default]
    Memory,

    /// One file per thread under `path`
    File {
        path: PathBuf,
        /// Compress checkpoint data with zstd
        compression: bool,
    },
}

pub fn create_checkpointer(config: CheckpointerConfig) -> Arc<dyn Checkpointer> {
    match config {
        CheckpointerConfig::Memory => Arc::new(MemoryCheckpointer::new()),
        CheckpointerConfig::File { path, compression } => Arc::new(FileCheckpointer::new(path, compression)),
    }
}

/// In-memory checkpointer
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    checkpoints: tokio::sync::RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ReportError> {
        validate_thread_id(&checkpoint.thread_id)?;
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn compare_and_save(&self, checkpoint: &Checkpoint, expected: Option<u64>) -> Result<(), ReportError> {
        validate_thread_id(&checkpoint.thread_id)?;
        let mut checkpoints = self.checkpoints.write().await;
        let current = checkpoints.get(&checkpoint.thread_id).map(|c| c.sequence);
        if current != expected {
            return Err(ReportError::ThreadBusy(checkpoint.thread_id.clone()));
        }
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, ReportError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), ReportError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.remove(thread_id);
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>, ReportError> {
        let checkpoints = self.checkpoints.read().await;
        let mut threads: Vec<String> = checkpoints.keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }
}
