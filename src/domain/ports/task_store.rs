use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::models::{Checkpoint, TaskEvent, TaskId, TaskMetadata, TaskStatus};
use crate::domain::ports::errors::StoreError;

/// Persistence port for task metadata, the per-task event journal and the
/// single-slot checkpoint.
///
/// Implementations must be safe to share between tasks. Operations on one
/// task are serialized against each other; distinct tasks do not contend.
#[async_trait]
pub trait TaskExecutionStore: Send + Sync {
    /// Insert or replace the metadata of a task
    async fn save_metadata(&self, metadata: &TaskMetadata) -> Result<(), StoreError>;

    /// Load task metadata; `Ok(None)` when the task is unknown
    async fn load_metadata(&self, task_id: &TaskId) -> Result<Option<TaskMetadata>, StoreError>;

    /// Durably append one event to the task's journal
    async fn append_event(&self, event: &TaskEvent) -> Result<(), StoreError>;

    /// All journal events in append order; empty for unknown tasks
    async fn load_events(&self, task_id: &TaskId) -> Result<Vec<TaskEvent>, StoreError>;

    /// Current journal length
    async fn event_count(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        Ok(self.load_events(task_id).await?.len())
    }

    /// Replace the task's checkpoint
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    /// Latest checkpoint, if any
    async fn load_checkpoint(&self, task_id: &TaskId) -> Result<Option<Checkpoint>, StoreError>;

    /// Ids of every task that has metadata
    async fn get_all_task_ids(&self) -> Result<HashSet<TaskId>, StoreError>;

    /// Ids of every task currently in `status`
    async fn get_task_ids_by_status(&self, status: TaskStatus) -> Result<Vec<TaskId>, StoreError> {
        let mut matching = Vec::new();
        for task_id in self.get_all_task_ids().await? {
            if let Some(metadata) = self.load_metadata(&task_id).await? {
                if metadata.status() == status {
                    matching.push(task_id);
                }
            }
        }
        matching.sort();
        Ok(matching)
    }

    /// Remove metadata, journal and checkpoint; `false` if nothing existed
    async fn delete(&self, task_id: &TaskId) -> Result<bool, StoreError>;

    /// Atomically move a task from `expected` to `new`.
    ///
    /// Returns `Ok(None)` when the task is unknown or no longer in
    /// `expected`, and [`StoreError::InvalidTransition`] when `expected`
    /// cannot move to `new`.
    async fn compare_and_set_status(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        new: TaskStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<TaskMetadata>, StoreError>;
}

/// Apply a CAS transition to a loaded record. Shared by the store
/// implementations, which call it while holding the task's lock.
pub(crate) fn apply_status_transition(
    current: &TaskMetadata,
    expected: TaskStatus,
    new: TaskStatus,
    failure_reason: Option<String>,
) -> Result<Option<TaskMetadata>, StoreError> {
    if current.status() != expected {
        return Ok(None);
    }
    current
        .transition_to(new, failure_reason)
        .map(Some)
        .map_err(|_| StoreError::InvalidTransition {
            task_id: current.id().clone(),
            from: expected,
            to: new,
        })
}
