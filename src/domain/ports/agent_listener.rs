use async_trait::async_trait;

use crate::domain::models::{AgentFailure, AgentRequest, AgentResponse, ExecutionScope};

/// Observer of the agent-invocation lifecycle, called by the orchestrator.
///
/// Every callback is best-effort: implementations must not fail the
/// invocation they observe, so none of them return a `Result`.
#[async_trait]
pub trait AgentListener: Send + Sync {
    async fn before_agent_invocation(&self, _request: AgentRequest<'_>) {}

    async fn after_agent_invocation(&self, _response: AgentResponse<'_>) {}

    async fn on_agent_invocation_error(&self, _failure: AgentFailure<'_>) {}

    /// Called once when the root call finishes, before its scope is dropped
    async fn before_scope_destroyed(&self, _scope: &ExecutionScope) {}

    /// Whether nested sub-agent invocations should be reported too
    fn inherited_by_subagents(&self) -> bool {
        false
    }
}
