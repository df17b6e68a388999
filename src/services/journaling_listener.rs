//! Agent listener that records every invocation in the task journal.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{
    AgentFailure, AgentRequest, AgentResponse, ExecutionScope, TaskEvent, TaskEventKind, TaskId,
};
use crate::domain::ports::{AgentListener, CheckpointHook, TaskExecutionStore};

/// Appends `AgentInvocation*` events for one task and fires the configured
/// checkpoint hooks.
///
/// Journaling is best-effort: store failures are logged and never reach the
/// orchestrator, so the observed invocation always proceeds unchanged.
pub struct JournalingAgentListener {
    task_id: TaskId,
    store: Arc<dyn TaskExecutionStore>,
    after_agent_checkpoint: Option<Arc<dyn CheckpointHook>>,
    root_call_checkpoint: Option<Arc<dyn CheckpointHook>>,
}

impl JournalingAgentListener {
    pub fn new(task_id: TaskId, store: Arc<dyn TaskExecutionStore>) -> Self {
        Self {
            task_id,
            store,
            after_agent_checkpoint: None,
            root_call_checkpoint: None,
        }
    }

    /// Checkpoint after every successful agent invocation.
    pub fn with_after_agent_checkpoint(mut self, hook: Arc<dyn CheckpointHook>) -> Self {
        self.after_agent_checkpoint = Some(hook);
        self
    }

    /// Checkpoint once the root call completes.
    pub fn with_root_call_checkpoint(mut self, hook: Arc<dyn CheckpointHook>) -> Self {
        self.root_call_checkpoint = Some(hook);
        self
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    async fn record(&self, kind: TaskEventKind) {
        let event = TaskEvent::now(self.task_id.clone(), kind);
        match self.store.append_event(&event).await {
            Ok(()) => debug!(task_id = %self.task_id, event_type = event.type_name(), "Journaled"),
            Err(e) => warn!(
                task_id = %self.task_id,
                event_type = event.type_name(),
                error = %e,
                "Failed to journal agent event"
            ),
        }
    }
}

#[async_trait]
impl AgentListener for JournalingAgentListener {
    async fn before_agent_invocation(&self, request: AgentRequest<'_>) {
        self.record(TaskEventKind::AgentInvocationStarted {
            agent_name: request.agent_name.to_string(),
            agent_id: request.agent_id.map(str::to_string),
            inputs: request.inputs.clone(),
        })
        .await;
    }

    async fn after_agent_invocation(&self, response: AgentResponse<'_>) {
        let serialized_output = serde_json::to_string(response.output)
            .unwrap_or_else(|_| response.output.to_string());
        self.record(TaskEventKind::AgentInvocationCompleted {
            agent_name: response.agent_name.to_string(),
            agent_id: response.agent_id.map(str::to_string),
            serialized_output: Some(serialized_output),
        })
        .await;

        if let Some(hook) = &self.after_agent_checkpoint {
            hook.on_checkpoint(response.scope).await;
        }
    }

    async fn on_agent_invocation_error(&self, failure: AgentFailure<'_>) {
        self.record(TaskEventKind::AgentInvocationFailed {
            agent_name: failure.agent_name.to_string(),
            agent_id: failure.agent_id.map(str::to_string),
            error_message: failure.error.to_string(),
            stack_trace: Some(format!("{:?}", failure.error)),
        })
        .await;
    }

    async fn before_scope_destroyed(&self, scope: &ExecutionScope) {
        if let Some(hook) = &self.root_call_checkpoint {
            hook.on_checkpoint(scope).await;
        }
    }

    fn inherited_by_subagents(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Checkpoint, TaskMetadata, TaskStatus};
    use crate::domain::ports::StoreError;
    use crate::infrastructure::store::InMemoryTaskStore;
    use serde_json::{json, Value};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CheckpointHook for CountingHook {
        async fn on_checkpoint(&self, _scope: &ExecutionScope) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    fn broken() -> StoreError {
        StoreError::InvalidTaskId("broken".to_string())
    }

    #[async_trait]
    impl TaskExecutionStore for BrokenStore {
        async fn save_metadata(&self, _: &TaskMetadata) -> Result<(), StoreError> {
            Err(broken())
        }
        async fn load_metadata(&self, _: &TaskId) -> Result<Option<TaskMetadata>, StoreError> {
            Err(broken())
        }
        async fn append_event(&self, _: &TaskEvent) -> Result<(), StoreError> {
            Err(broken())
        }
        async fn load_events(&self, _: &TaskId) -> Result<Vec<TaskEvent>, StoreError> {
            Err(broken())
        }
        async fn save_checkpoint(&self, _: &Checkpoint) -> Result<(), StoreError> {
            Err(broken())
        }
        async fn load_checkpoint(&self, _: &TaskId) -> Result<Option<Checkpoint>, StoreError> {
            Err(broken())
        }
        async fn get_all_task_ids(&self) -> Result<HashSet<TaskId>, StoreError> {
            Err(broken())
        }
        async fn delete(&self, _: &TaskId) -> Result<bool, StoreError> {
            Err(broken())
        }
        async fn compare_and_set_status(
            &self,
            _: &TaskId,
            _: TaskStatus,
            _: TaskStatus,
            _: Option<String>,
        ) -> Result<Option<TaskMetadata>, StoreError> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn test_records_invocation_lifecycle_in_order() {
        let store = Arc::new(InMemoryTaskStore::new());
        let id = TaskId::new("t-1");
        let listener = JournalingAgentListener::new(id.clone(), store.clone());
        let scope = ExecutionScope::new();
        let inputs = HashMap::from([("topic".to_string(), json!("rust"))]);
        let output = json!({"draft": "text"});
        let error = anyhow::anyhow!("rate limited");

        listener
            .before_agent_invocation(AgentRequest {
                agent_name: "writer",
                agent_id: Some("writer-0"),
                inputs: &inputs,
                scope: &scope,
            })
            .await;
        listener
            .after_agent_invocation(AgentResponse {
                agent_name: "writer",
                agent_id: Some("writer-0"),
                inputs: &inputs,
                output: &output,
                scope: &scope,
            })
            .await;
        listener
            .on_agent_invocation_error(AgentFailure {
                agent_name: "editor",
                agent_id: None,
                error: &error,
                scope: &scope,
            })
            .await;

        let events = store.load_events(&id).await.unwrap();
        let types: Vec<&str> = events.iter().map(TaskEvent::type_name).collect();
        assert_eq!(
            types,
            vec![
                "agent_invocation_started",
                "agent_invocation_completed",
                "agent_invocation_failed"
            ]
        );

        match &events[1].kind {
            TaskEventKind::AgentInvocationCompleted {
                serialized_output, ..
            } => {
                let value: Value = serde_json::from_str(serialized_output.as_deref().unwrap()).unwrap();
                assert_eq!(value, output);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match &events[2].kind {
            TaskEventKind::AgentInvocationFailed { error_message, .. } => {
                assert_eq!(error_message, "rate limited");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hooks_fire_at_their_points() {
        let store = Arc::new(InMemoryTaskStore::new());
        let after_agent = Arc::new(CountingHook::default());
        let root_call = Arc::new(CountingHook::default());
        let listener = JournalingAgentListener::new(TaskId::new("t-2"), store)
            .with_after_agent_checkpoint(after_agent.clone())
            .with_root_call_checkpoint(root_call.clone());

        let scope = ExecutionScope::new();
        let inputs = HashMap::new();
        let output = Value::Null;
        for _ in 0..2 {
            listener
                .after_agent_invocation(AgentResponse {
                    agent_name: "a",
                    agent_id: None,
                    inputs: &inputs,
                    output: &output,
                    scope: &scope,
                })
                .await;
        }
        listener.before_scope_destroyed(&scope).await;

        assert_eq!(after_agent.calls.load(Ordering::SeqCst), 2);
        assert_eq!(root_call.calls.load(Ordering::SeqCst), 1);
        assert!(listener.inherited_by_subagents());
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let hook = Arc::new(CountingHook::default());
        let listener = JournalingAgentListener::new(TaskId::new("t-3"), Arc::new(BrokenStore))
            .with_after_agent_checkpoint(hook.clone());

        let scope = ExecutionScope::new();
        let inputs = HashMap::new();
        let output = json!(1);
        listener
            .after_agent_invocation(AgentResponse {
                agent_name: "a",
                agent_id: None,
                inputs: &inputs,
                output: &output,
                scope: &scope,
            })
            .await;

        // The checkpoint hook still runs after a failed append
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }
}
