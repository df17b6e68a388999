use async_trait::async_trait;

use crate::domain::models::ExecutionScope;

/// Callback fired by the journaling listener at checkpoint points.
#[async_trait]
pub trait CheckpointHook: Send + Sync {
    async fn on_checkpoint(&self, scope: &ExecutionScope);
}
