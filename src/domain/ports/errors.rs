use std::path::PathBuf;
use thiserror::Error;

use crate::domain::models::task::{TaskId, TaskStatus};

/// Task store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupted journal for task {task_id} at line {line}: {source}")]
    CorruptedJournal {
        task_id: TaskId,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),

    #[error("Invalid state transition for task {task_id} from {from} to {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
