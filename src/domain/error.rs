use thiserror::Error;

use super::models::task::{TaskId, TaskStatus};
use super::ports::errors::StoreError;

/// Domain-level errors for task lifecycle operations
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {task_id} is in terminal state: {status}")]
    TaskInTerminalState { task_id: TaskId, status: TaskStatus },

    #[error("Task {task_id} is already active ({status})")]
    TaskAlreadyActive { task_id: TaskId, status: TaskStatus },

    #[error("Task {task_id} is not paused (current status: {status})")]
    NotPaused { task_id: TaskId, status: TaskStatus },

    #[error("Task {task_id} is not in a terminal state (current status: {status})")]
    TaskNotTerminal { task_id: TaskId, status: TaskStatus },

    #[error("Task {task_id} changed concurrently (expected {expected})")]
    ConcurrentTransition { task_id: TaskId, expected: TaskStatus },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Task {task_id} failed: {message}")]
    Failed { task_id: TaskId, message: String },

    #[error("Task {task_id} paused: {reason}")]
    Paused { task_id: TaskId, reason: String },

    #[error("Task {0} was cancelled")]
    Cancelled(TaskId),

    #[error("Task {0} was resumed by another handle")]
    Superseded(TaskId),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// What a workflow run can fail with.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The workflow asked to suspend, e.g. to wait for human input.
    #[error("Paused: {reason}")]
    Paused {
        reason: String,
        pending_agent: Option<String>,
    },

    #[error("Agent '{agent_name}' failed: {source}")]
    Agent {
        agent_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn pause(reason: impl Into<String>) -> Self {
        Self::Paused {
            reason: reason.into(),
            pending_agent: None,
        }
    }

    pub fn pause_for_agent(reason: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self::Paused {
            reason: reason.into(),
            pending_agent: Some(agent_name.into()),
        }
    }

    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    /// Full error chain, recorded as the stack trace of failure events.
    pub fn stack_trace(&self) -> String {
        match self {
            Self::Paused { .. } => self.to_string(),
            Self::Agent { source, .. } | Self::Other(source) => format!("{source:?}"),
        }
    }
}
