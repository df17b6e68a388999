//! Caller-facing handle over an in-flight task.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::warn;

use crate::domain::error::TaskError;
use crate::domain::models::{TaskId, TaskMetadata, TaskStatus};

/// How a run of a task ended, as seen by its handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(Value),
    Failed(String),
    Paused {
        reason: String,
        pending_agent: Option<String>,
    },
    Cancelled,
    /// A later `resume` took over the task.
    Superseded,
}

/// Store-atomic cancellation, injected into handles by the service.
#[async_trait]
pub trait CancellationHook: Send + Sync {
    async fn cancel(&self, task_id: &TaskId) -> Result<bool, TaskError>;
}

struct HandleShared {
    id: TaskId,
    metadata: watch::Sender<TaskMetadata>,
    outcome: watch::Sender<Option<TaskOutcome>>,
    abort: OnceLock<AbortHandle>,
    cancel_hook: Option<Arc<dyn CancellationHook>>,
}

/// Live view of one run of a task. Cheap to clone.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<HandleShared>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl TaskHandle {
    /// Handle without store-backed cancellation.
    ///
    /// `cancel` on such a handle only stops the local computation and leaves
    /// the stored status untouched.
    pub fn new(metadata: TaskMetadata) -> Self {
        Self::build(metadata, None)
    }

    /// Handle whose `cancel` goes through `hook`.
    pub fn with_cancellation_hook(metadata: TaskMetadata, hook: Arc<dyn CancellationHook>) -> Self {
        Self::build(metadata, Some(hook))
    }

    fn build(metadata: TaskMetadata, cancel_hook: Option<Arc<dyn CancellationHook>>) -> Self {
        let id = metadata.id().clone();
        let (metadata, _) = watch::channel(metadata);
        let (outcome, _) = watch::channel(None);
        Self {
            shared: Arc::new(HandleShared {
                id,
                metadata,
                outcome,
                abort: OnceLock::new(),
                cancel_hook,
            }),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.shared.id
    }

    /// Status of the latest metadata snapshot pushed to this handle.
    pub fn status(&self) -> TaskStatus {
        self.shared.metadata.borrow().status()
    }

    pub fn metadata(&self) -> TaskMetadata {
        self.shared.metadata.borrow().clone()
    }

    /// Replace the held metadata snapshot.
    pub fn update_metadata(&self, metadata: TaskMetadata) {
        self.shared.metadata.send_replace(metadata);
    }

    pub fn is_finished(&self) -> bool {
        self.shared.outcome.borrow().is_some()
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.shared.outcome.borrow().clone()
    }

    /// The result, present only once the run completed successfully.
    pub fn result(&self) -> Option<Value> {
        match &*self.shared.outcome.borrow() {
            Some(TaskOutcome::Completed(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Wait for this run to end.
    pub async fn wait(&self) -> TaskOutcome {
        let mut rx = self.shared.outcome.subscribe();
        // The sender lives in `shared`, which `self` keeps alive
        let Ok(outcome) = rx.wait_for(Option::is_some).await else {
            return TaskOutcome::Cancelled;
        };
        outcome.clone().unwrap_or(TaskOutcome::Cancelled)
    }

    /// Wait for the run and map anything but success to a [`TaskError`].
    pub async fn await_result(&self) -> Result<Value, TaskError> {
        let task_id = self.id().clone();
        match self.wait().await {
            TaskOutcome::Completed(value) => Ok(value),
            TaskOutcome::Failed(message) => Err(TaskError::Failed { task_id, message }),
            TaskOutcome::Paused { reason, .. } => Err(TaskError::Paused { task_id, reason }),
            TaskOutcome::Cancelled => Err(TaskError::Cancelled(task_id)),
            TaskOutcome::Superseded => Err(TaskError::Superseded(task_id)),
        }
    }

    /// Cancel the task.
    ///
    /// With a cancellation hook this is store-atomic. Without one only the
    /// local computation is stopped, and another process may still resume
    /// the task.
    pub async fn cancel(&self) -> Result<bool, TaskError> {
        if let Some(hook) = &self.shared.cancel_hook {
            return hook.cancel(self.id()).await;
        }

        warn!(
            task_id = %self.id(),
            "No cancellation hook wired, cancelling the local computation only"
        );
        if self.is_finished() {
            return Ok(false);
        }
        self.abort();
        Ok(self.resolve(TaskOutcome::Cancelled))
    }

    pub(crate) fn attach(&self, abort: AbortHandle) {
        let _ = self.shared.abort.set(abort);
    }

    pub(crate) fn abort(&self) {
        if let Some(abort) = self.shared.abort.get() {
            abort.abort();
        }
    }

    /// Publish the outcome. The first one wins; returns whether this call
    /// set it.
    pub(crate) fn resolve(&self, outcome: TaskOutcome) -> bool {
        self.shared.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        })
    }

    pub(crate) fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
