//! Best-effort checkpointing.
//!
//! A checkpoint only speeds up resumption; the journal alone is enough to
//! rebuild a task. Failures are therefore reported as a [`CheckpointOutcome`]
//! and logged, never returned as errors.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{Checkpoint, ExecutionScope, TaskId, TaskMetadata};
use crate::domain::ports::{CheckpointHook, TaskExecutionStore};

/// Result of a checkpoint attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Saved { event_count: usize },
    Failed { reason: String },
}

impl CheckpointOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Snapshots task state into the store.
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn TaskExecutionStore>,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn TaskExecutionStore>) -> Self {
        Self { store }
    }

    /// Persist a checkpoint stamped with the current journal length.
    ///
    /// A scope that is absent or fails to serialize is stored as `None`.
    pub async fn checkpoint<S>(
        &self,
        task_id: &TaskId,
        metadata: &TaskMetadata,
        scope: Option<&S>,
    ) -> CheckpointOutcome
    where
        S: Serialize + ?Sized + Sync,
    {
        let serialized_scope = scope.and_then(|scope| match serde_json::to_string(scope) {
            Ok(serialized) => Some(serialized),
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Failed to serialize scope, checkpointing without it");
                None
            }
        });

        let event_count = match self.store.event_count(task_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Checkpoint skipped: journal unavailable");
                return CheckpointOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let checkpoint = Checkpoint {
            task_id: task_id.clone(),
            metadata: metadata.clone(),
            serialized_scope,
            event_count,
            taken_at: Utc::now(),
        };

        match self.store.save_checkpoint(&checkpoint).await {
            Ok(()) => {
                debug!(task_id = %task_id, event_count, "Checkpoint saved");
                CheckpointOutcome::Saved { event_count }
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Failed to save checkpoint");
                CheckpointOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// [`CheckpointHook`] that checkpoints a task with its latest stored metadata.
pub struct StoreCheckpointHook {
    task_id: TaskId,
    store: Arc<dyn TaskExecutionStore>,
    manager: CheckpointManager,
}

impl StoreCheckpointHook {
    pub fn new(task_id: TaskId, store: Arc<dyn TaskExecutionStore>) -> Self {
        Self {
            task_id,
            manager: CheckpointManager::new(Arc::clone(&store)),
            store,
        }
    }
}

#[async_trait]
impl CheckpointHook for StoreCheckpointHook {
    async fn on_checkpoint(&self, scope: &ExecutionScope) {
        match self.store.load_metadata(&self.task_id).await {
            Ok(Some(metadata)) => {
                self.manager
                    .checkpoint(&self.task_id, &metadata, Some(scope))
                    .await;
            }
            Ok(None) => {
                warn!(task_id = %self.task_id, "Checkpoint skipped: task metadata missing");
            }
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "Checkpoint skipped: metadata unavailable");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{TaskEvent, TaskEventKind};
    use crate::infrastructure::store::InMemoryTaskStore;
    use serde::Serializer;
    use serde_json::json;
    use std::collections::HashMap;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("scope cannot be serialized"))
        }
    }

    fn setup() -> (Arc<InMemoryTaskStore>, CheckpointManager, TaskMetadata) {
        let store = Arc::new(InMemoryTaskStore::new());
        let manager = CheckpointManager::new(store.clone());
        let metadata = TaskMetadata::create(TaskId::new("t-1"), "writer", HashMap::new());
        (store, manager, metadata)
    }

    #[tokio::test]
    async fn test_unserializable_scope_still_checkpoints() {
        let (store, manager, metadata) = setup();

        let outcome = manager
            .checkpoint(metadata.id(), &metadata, Some(&Unserializable))
            .await;
        assert_eq!(outcome, CheckpointOutcome::Saved { event_count: 0 });

        let checkpoint = store.load_checkpoint(metadata.id()).await.unwrap().unwrap();
        assert!(checkpoint.serialized_scope.is_none());
        assert_eq!(checkpoint.metadata, metadata);
    }

    #[tokio::test]
    async fn test_event_count_and_scope_are_recorded() {
        let (store, manager, metadata) = setup();
        for _ in 0..3 {
            store
                .append_event(&TaskEvent::now(
                    metadata.id().clone(),
                    TaskEventKind::TaskResumed {
                        user_input: HashMap::new(),
                    },
                ))
                .await
                .unwrap();
        }

        let mut scope = ExecutionScope::new();
        scope.write_state("draft", json!("hello"));

        let outcome = manager.checkpoint(metadata.id(), &metadata, Some(&scope)).await;
        assert!(outcome.is_saved());

        let checkpoint = store.load_checkpoint(metadata.id()).await.unwrap().unwrap();
        assert_eq!(checkpoint.event_count, 3);
        let restored =
            ExecutionScope::from_serialized(checkpoint.serialized_scope.as_deref().unwrap()).unwrap();
        assert_eq!(restored, scope);
    }

    #[tokio::test]
    async fn test_absent_scope() {
        let (store, manager, metadata) = setup();
        manager
            .checkpoint::<ExecutionScope>(metadata.id(), &metadata, None)
            .await;

        let checkpoint = store.load_checkpoint(metadata.id()).await.unwrap().unwrap();
        assert!(checkpoint.serialized_scope.is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_snapshot_is_independent_of_later_transitions() {
        let (store, manager, metadata) = setup();
        manager
            .checkpoint::<ExecutionScope>(metadata.id(), &metadata, None)
            .await;

        let running = metadata
            .transition_to(crate::domain::models::TaskStatus::Running, None)
            .unwrap();
        store.save_metadata(&running).await.unwrap();

        let checkpoint = store.load_checkpoint(metadata.id()).await.unwrap().unwrap();
        assert_eq!(
            checkpoint.metadata.status(),
            crate::domain::models::TaskStatus::Created
        );
    }
}
