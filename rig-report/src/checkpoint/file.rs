//! File-based checkpointer
//!
//! ```text
//! checkpoints/
//! ├── {thread_id}.json[.zst]
//! └── {thread_id}.json[.zst]
//! ```
//!
//! Writes go to a per-write temp file that is synced and renamed over the
//! target. `compare_and_save` holds `{thread_id}.lock`, created with
//! `create_new`, across its read and write, so separate processes sharing
//! the directory cannot both move a thread from the same sequence.

use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{validate_thread_id, Checkpoint, Checkpointer};
use crate::error::ReportError;

/// A lock file this old was left by a writer that died mid-save
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

/// Exclusive `{thread_id}.lock`, removed on drop
struct WriteLock {
    path: PathBuf,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove checkpoint lock");
        }
    }
}

/// File-based checkpointer storing one JSON document per thread
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    base_path: PathBuf,
    compression: bool,
}

impl FileCheckpointer {
    pub fn new(base_path: impl Into<PathBuf>, compression: bool) -> Self {
        Self {
            base_path: base_path.into(),
            compression,
        }
    }

    fn extension(&self) -> &'static str {
        if self.compression {
            ".json.zst"
        } else {
            ".json"
        }
    }

    fn checkpoint_path(&self, thread_id: &str) -> PathBuf {
        self.base_path.join(format!("{}{}", thread_id, self.extension()))
    }

    fn temp_path(&self, thread_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}.tmp", thread_id, Uuid::new_v4()))
    }

    fn lock_path(&self, thread_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.lock", thread_id))
    }

    async fn acquire_lock(&self, thread_id: &str) -> Result<WriteLock, ReportError> {
        let path = self.lock_path(thread_id);
        for _ in 0..2 {
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(_) => return Ok(WriteLock { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !Self::lock_is_stale(&path).await {
                        return Err(ReportError::ThreadBusy(thread_id.to_string()));
                    }
                    warn!(path = %path.display(), "Removing stale checkpoint lock");
                    match fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => {
                            return Err(ReportError::checkpoint_error(format!("Failed to remove stale lock: {}", e)))
                        }
                    }
                }
                Err(e) => return Err(ReportError::checkpoint_error(format!("Failed to create lock file: {}", e))),
            }
        }
        Err(ReportError::ThreadBusy(thread_id.to_string()))
    }

    async fn lock_is_stale(path: &Path) -> bool {
        match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified.elapsed().map(|age| age > LOCK_STALE_AFTER).unwrap_or(false),
            // gone already; the retry will create it
            Err(_) => true,
        }
    }

    async fn write_atomic(&self, checkpoint: &Checkpoint) -> Result<(), ReportError> {
        let json = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| ReportError::checkpoint_error(format!("Serialization failed: {}", e)))?;
        let data = if self.compression { Self::compress(&json)? } else { json };

        let temp_path = self.temp_path(&checkpoint.thread_id);
        let final_path = self.checkpoint_path(&checkpoint.thread_id);

        let written = async {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(|e| ReportError::checkpoint_error(format!("Failed to create temp file: {}", e)))?;
            file.write_all(&data)
                .await
                .map_err(|e| ReportError::checkpoint_error(format!("Failed to write data: {}", e)))?;
            file.sync_all()
                .await
                .map_err(|e| ReportError::checkpoint_error(format!("Failed to sync file: {}", e)))?;
            fs::rename(&temp_path, &final_path)
                .await
                .map_err(|e| ReportError::checkpoint_error(format!("Failed to rename file: {}", e)))
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        written?;

        debug!(
            thread_id = %checkpoint.thread_id,
            sequence = checkpoint.sequence,
            status = %checkpoint.status,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn ensure_dir(&self) -> Result<(), ReportError> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| ReportError::checkpoint_error(format!("Failed to create directory: {}", e)))
    }

    fn compress(data: &[u8]) -> Result<Vec<u8>, ReportError> {
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3)
            .map_err(|e| ReportError::checkpoint_error(format!("Compression init failed: {}", e)))?;
        encoder
            .write_all(data)
            .map_err(|e| ReportError::checkpoint_error(format!("Compression write failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| ReportError::checkpoint_error(format!("Compression finish failed: {}", e)))
    }

    fn decompress(data: &[u8]) -> Result<Vec<u8>, ReportError> {
        zstd::stream::decode_all(data)
            .map_err(|e| ReportError::checkpoint_error(format!("Decompression failed: {}", e)))
    }

    /// Thread id from a checkpoint file name with this store's extension
    fn parse_thread_id(&self, path: &Path) -> Option<String> {
        let filename = path.file_name()?.to_str()?;
        let thread_id = filename.strip_suffix(self.extension())?;
        validate_thread_id(thread_id).ok()?;
        Some(thread_id.to_string())
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ReportError> {
        validate_thread_id(&checkpoint.thread_id)?;
        self.ensure_dir().await?;
        self.write_atomic(checkpoint).await
    }

    async fn compare_and_save(&self, checkpoint: &Checkpoint, expected: Option<u64>) -> Result<(), ReportError> {
        validate_thread_id(&checkpoint.thread_id)?;
        self.ensure_dir().await?;

        let _lock = self.acquire_lock(&checkpoint.thread_id).await?;
        let current = self.load(&checkpoint.thread_id).await?.map(|c| c.sequence);
        if current != expected {
            debug!(
                thread_id = %checkpoint.thread_id,
                ?current,
                ?expected,
                "Checkpoint moved by another writer"
            );
            return Err(ReportError::ThreadBusy(checkpoint.thread_id.clone()));
        }
        self.write_atomic(checkpoint).await
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, ReportError> {
        validate_thread_id(thread_id)?;
        let path = self.checkpoint_path(thread_id);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ReportError::checkpoint_error(format!("Failed to read file: {}", e))),
        };

        let json = if self.compression { Self::decompress(&data)? } else { data };

        let checkpoint = serde_json::from_slice(&json)
            .map_err(|e| ReportError::checkpoint_error(format!("Deserialization failed: {}", e)))?;
        Ok(Some(checkpoint))
    }

    async fn delete(&self, thread_id: &str) -> Result<(), ReportError> {
        validate_thread_id(thread_id)?;
        match fs::remove_file(self.checkpoint_path(thread_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReportError::checkpoint_error(format!("Failed to delete file: {}", e))),
        }
    }

    async fn list_threads(&self) -> Result<Vec<String>, ReportError> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ReportError::checkpoint_error(format!("Failed to read directory: {}", e))),
        };

        let mut threads = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ReportError::checkpoint_error(format!("Failed to read entry: {}", e)))?
        {
            if let Some(thread_id) = self.parse_thread_id(&entry.path()) {
                threads.push(thread_id);
            }
        }

        threads.sort();
        Ok(threads)
    }
}
