use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::domain::error::WorkflowError;
use crate::domain::models::TaskId;

/// The unit of work a durable task executes.
///
/// A run is re-invoked on retry and on resume, so it should rebuild its
/// planner through the service's replaying planner to skip completed steps.
/// The task id is passed in for exactly that purpose.
#[async_trait]
pub trait TaskWorkflow: Send + Sync {
    async fn run(&self, task_id: &TaskId) -> Result<Value, WorkflowError>;
}

#[async_trait]
impl<F, Fut> TaskWorkflow for F
where
    F: Fn(TaskId) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, WorkflowError>> + Send,
{
    async fn run(&self, task_id: &TaskId) -> Result<Value, WorkflowError> {
        (self)(task_id.clone()).await
    }
}
