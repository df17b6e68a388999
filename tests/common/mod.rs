//! Common test utilities for integration tests
//!
//! Provides a scripted planner, a scripted agent registry and a small
//! orchestration loop that drives a planner while notifying an agent
//! listener, the way an agent runtime would.

#![allow(dead_code)]

use async_trait::async_trait;
use durable_tasks::{
    Action, AgentFailure, AgentInstance, AgentInvocation, AgentListener, AgentRequest,
    AgentResponse, CheckpointPolicy, DurableTaskService, ExecutionScope, InitPlanningContext,
    Planner, TaskId, TaskWorkflow, WorkflowError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll `predicate` every 10ms until it holds or `timeout_ms` elapses.
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// Calls one agent per step, in order. Each agent writes to `<name>_out`.
pub struct SequentialPlanner {
    agents: Vec<AgentInstance>,
    cursor: usize,
    pub seen_outputs: Vec<Value>,
}

impl SequentialPlanner {
    pub fn new(names: &[&str]) -> Self {
        Self {
            agents: names
                .iter()
                .map(|name| AgentInstance::new(*name).with_output_key(format!("{name}_out")))
                .collect(),
            cursor: 0,
            seen_outputs: Vec::new(),
        }
    }

    pub fn agents(&self) -> &[AgentInstance] {
        &self.agents
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn current(&self) -> Action {
        self.agents
            .get(self.cursor)
            .cloned()
            .map_or(Action::Done, Action::call)
    }
}

impl Planner for SequentialPlanner {
    fn first_action(&mut self, _scope: &mut ExecutionScope) -> Action {
        self.current()
    }

    fn next_action(&mut self, _scope: &mut ExecutionScope, last: &AgentInvocation) -> Action {
        self.seen_outputs.push(last.output.clone());
        self.cursor += 1;
        self.current()
    }

    fn terminated(&self) -> bool {
        self.cursor >= self.agents.len()
    }
}

type AgentFn = Arc<dyn Fn(&ExecutionScope) -> Result<Value, WorkflowError> + Send + Sync>;

/// Named agent implementations plus a log of every real invocation.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentFn>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, name: &str, agent: F) -> Self
    where
        F: Fn(&ExecutionScope) -> Result<Value, WorkflowError> + Send + Sync + 'static,
    {
        self.agents.insert(name.to_string(), Arc::new(agent));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    fn invoke(&self, name: &str, scope: &ExecutionScope) -> Result<Value, WorkflowError> {
        self.calls.lock().unwrap().push(name.to_string());
        match self.agents.get(name) {
            Some(agent) => agent(scope),
            None => Err(WorkflowError::Other(anyhow::anyhow!("unknown agent {name}"))),
        }
    }
}

/// Drive `planner` to completion, invoking agents from `agents` and
/// reporting every invocation to `listener`. Returns the final scope state.
pub async fn orchestrate<P: Planner>(
    planner: &mut P,
    listener: &dyn AgentListener,
    agents: &AgentRegistry,
    scope: &mut ExecutionScope,
    subagents: &[AgentInstance],
) -> Result<Value, WorkflowError> {
    planner.init(InitPlanningContext {
        scope: &*scope,
        planner_agent: None,
        subagents,
    });

    let mut action = planner.first_action(scope);
    while let Action::Call(batch) = action {
        let mut last = None;
        for agent in batch {
            let inputs: HashMap<String, Value> = scope.state().clone();
            listener
                .before_agent_invocation(AgentRequest {
                    agent_name: &agent.name,
                    agent_id: agent.agent_id.as_deref(),
                    inputs: &inputs,
                    scope: &*scope,
                })
                .await;

            match agents.invoke(&agent.name, scope) {
                Ok(output) => {
                    if let Some(key) = &agent.output_key {
                        scope.write_state(key.clone(), output.clone());
                    }
                    listener
                        .after_agent_invocation(AgentResponse {
                            agent_name: &agent.name,
                            agent_id: agent.agent_id.as_deref(),
                            inputs: &inputs,
                            output: &output,
                            scope: &*scope,
                        })
                        .await;
                    last = Some(AgentInvocation {
                        agent_name: agent.name.clone(),
                        agent_id: agent.agent_id.clone(),
                        inputs,
                        output,
                    });
                }
                Err(WorkflowError::Other(source)) => {
                    listener
                        .on_agent_invocation_error(AgentFailure {
                            agent_name: &agent.name,
                            agent_id: agent.agent_id.as_deref(),
                            error: &source,
                            scope: &*scope,
                        })
                        .await;
                    return Err(WorkflowError::Agent {
                        agent_name: agent.name.clone(),
                        source,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let Some(last) = last else {
            break;
        };
        action = planner.next_action(scope, &last);
    }

    listener.before_scope_destroyed(scope).await;
    Ok(serde_json::to_value(scope.state()).unwrap_or_default())
}

/// Workflow that replays the task journal, then runs the remaining steps
/// of a [`SequentialPlanner`] with journaling enabled.
pub struct JournaledWorkflow {
    pub service: DurableTaskService,
    pub agents: AgentRegistry,
    pub steps: Vec<&'static str>,
    pub policy: CheckpointPolicy,
}

impl JournaledWorkflow {
    pub fn new(service: &DurableTaskService, agents: &AgentRegistry, steps: &[&'static str]) -> Self {
        Self {
            service: service.clone(),
            agents: agents.clone(),
            steps: steps.to_vec(),
            policy: CheckpointPolicy::AfterEachAgent,
        }
    }
}

#[async_trait]
impl TaskWorkflow for JournaledWorkflow {
    async fn run(&self, task_id: &TaskId) -> Result<Value, WorkflowError> {
        let delegate = SequentialPlanner::new(&self.steps);
        let subagents = delegate.agents().to_vec();
        let mut planner = self
            .service
            .replaying_planner(task_id, delegate)
            .await
            .map_err(|e| WorkflowError::Other(e.into()))?;
        let listener = self.service.create_journaling_listener(task_id, self.policy);

        let mut scope = ExecutionScope::new();
        orchestrate(&mut planner, &listener, &self.agents, &mut scope, &subagents).await
    }
}
