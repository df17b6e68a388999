//! In-memory task store for tests and single-process use.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::domain::models::{Checkpoint, TaskEvent, TaskId, TaskMetadata, TaskStatus};
use crate::domain::ports::errors::StoreError;
use crate::domain::ports::task_store::{apply_status_transition, TaskExecutionStore};

#[derive(Debug, Default)]
struct TaskRecord {
    metadata: Option<TaskMetadata>,
    events: Vec<TaskEvent>,
    checkpoint: Option<Checkpoint>,
}

/// Process-local store. Everything is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskExecutionStore for InMemoryTaskStore {
    async fn save_metadata(&self, metadata: &TaskMetadata) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        tasks.entry(metadata.id().clone()).or_default().metadata = Some(metadata.clone());
        Ok(())
    }

    async fn load_metadata(&self, task_id: &TaskId) -> Result<Option<TaskMetadata>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(task_id).and_then(|r| r.metadata.clone()))
    }

    async fn append_event(&self, event: &TaskEvent) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        tasks
            .entry(event.task_id.clone())
            .or_default()
            .events
            .push(event.clone());
        Ok(())
    }

    async fn load_events(&self, task_id: &TaskId) -> Result<Vec<TaskEvent>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(task_id).map(|r| r.events.clone()).unwrap_or_default())
    }

    async fn event_count(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(task_id).map_or(0, |r| r.events.len()))
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        tasks.entry(checkpoint.task_id.clone()).or_default().checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    async fn load_checkpoint(&self, task_id: &TaskId) -> Result<Option<Checkpoint>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(task_id).and_then(|r| r.checkpoint.clone()))
    }

    async fn get_all_task_ids(&self) -> Result<HashSet<TaskId>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .filter(|(_, record)| record.metadata.is_some())
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn get_task_ids_by_status(&self, status: TaskStatus) -> Result<Vec<TaskId>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut matching: Vec<TaskId> = tasks
            .iter()
            .filter(|(_, record)| {
                record
                    .metadata
                    .as_ref()
                    .is_some_and(|m| m.status() == status)
            })
            .map(|(id, _)| id.clone())
            .collect();
        matching.sort();
        Ok(matching)
    }

    async fn delete(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks.remove(task_id).is_some())
    }

    async fn compare_and_set_status(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        new: TaskStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<TaskMetadata>, StoreError> {
        let mut tasks = self.tasks.write().await;
        let Some(record) = tasks.get_mut(task_id) else {
            return Ok(None);
        };
        let Some(current) = record.metadata.as_ref() else {
            return Ok(None);
        };

        let updated = apply_status_transition(current, expected, new, failure_reason)?;
        if let Some(updated) = &updated {
            record.metadata = Some(updated.clone());
        }
        Ok(updated)
    }
}
