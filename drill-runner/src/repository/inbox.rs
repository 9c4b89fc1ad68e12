//! Durable task inbox
//!
//! A FIFO of pending tasks stored in an embedded sled database so queued work
//! survives restarts. Keys are ids from [`sled::Db::generate_id`], written
//! big-endian, so key order is enqueue order even across restarts.
//!
//! Dequeue is destructive: a pulled record is gone from disk before the task
//! runs, which makes delivery at-most-once.

use drill_core::domain::task::Task;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by inbox storage
#[derive(Debug, Error)]
pub enum InboxError {
    /// The configured queue directory does not exist
    #[error("inbox storage directory {0} does not exist or is not a directory")]
    MissingStorage(PathBuf),

    /// The database could not be opened (corrupt files, permissions, lock held)
    #[error("failed to open inbox storage at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    /// Read or write against the open database failed
    #[error("inbox storage error: {0}")]
    Storage(#[from] sled::Error),

    /// The task could not be serialized
    #[error("failed to encode task: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One dequeued record, still in its stored form
#[derive(Debug, Clone)]
pub struct InboxRecord {
    pub id: u64,
    pub bytes: Vec<u8>,
}

impl InboxRecord {
    /// Decodes the stored bytes into a task
    pub fn decode(&self) -> Result<Task, serde_json::Error> {
        serde_json::from_slice(&self.bytes)
    }
}

/// Disk-backed FIFO of pending tasks
pub struct Inbox {
    db: sled::Db,
}

impl Inbox {
    /// Opens the inbox stored in `dir`
    ///
    /// The directory must already exist; a missing directory is reported
    /// instead of silently starting an empty queue somewhere else.
    pub fn open(dir: &Path) -> Result<Self, InboxError> {
        if !dir.is_dir() {
            return Err(InboxError::MissingStorage(dir.to_path_buf()));
        }

        let path = dir.join("inbox.sled");
        let db = sled::open(&path).map_err(|source| InboxError::Open {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), pending = db.len(), "Opened task inbox");
        Ok(Self { db })
    }

    /// Appends one task to the tail of the queue
    ///
    /// Returns the record id. The same task pushed twice is stored twice.
    pub fn push(&self, task: &Task) -> Result<u64, InboxError> {
        let bytes = serde_json::to_vec(task)?;
        let id = self.db.generate_id()?;

        self.db.insert(id.to_be_bytes(), bytes)?;
        self.db.flush()?;

        debug!(record_id = id, task_id = task.task_id, "Enqueued task");
        Ok(id)
    }

    /// Removes and returns the oldest record
    ///
    /// `Ok(None)` means the queue is empty.
    pub fn pull(&self) -> Result<Option<InboxRecord>, InboxError> {
        let Some((key, value)) = self.db.pop_min()? else {
            return Ok(None);
        };

        let mut id = [0u8; 8];
        if key.len() == id.len() {
            id.copy_from_slice(&key);
        }

        Ok(Some(InboxRecord {
            id: u64::from_be_bytes(id),
            bytes: value.to_vec(),
        }))
    }

    /// Number of pending records
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Stores raw bytes as a record; used to exercise decode failures
    #[cfg(test)]
    pub(crate) fn push_raw(&self, bytes: &[u8]) -> Result<u64, InboxError> {
        let id = self.db.generate_id()?;
        self.db.insert(id.to_be_bytes(), bytes)?;
        Ok(id)
    }
}
