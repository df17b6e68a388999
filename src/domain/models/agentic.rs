//! Values exchanged with the external orchestration runtime: agent
//! descriptors, planner actions and listener payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::scope::ExecutionScope;

/// Descriptor of an agent the planner may schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInstance {
    pub name: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Scope key the agent's output is written to.
    #[serde(default)]
    pub output_key: Option<String>,
}

impl AgentInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_id: None,
            output_key: None,
        }
    }

    pub fn with_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_output_key(mut self, output_key: impl Into<String>) -> Self {
        self.output_key = Some(output_key.into());
        self
    }
}

/// A finished agent invocation, fed back to the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInvocation {
    pub agent_name: String,
    pub agent_id: Option<String>,
    pub inputs: HashMap<String, Value>,
    pub output: Value,
}

/// What the planner wants the orchestrator to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Invoke these agents next.
    Call(Vec<AgentInstance>),
    /// The plan is finished.
    Done,
}

impl Action {
    pub fn call(agent: AgentInstance) -> Self {
        Self::Call(vec![agent])
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Agents to invoke, empty for [`Action::Done`].
    pub fn agents(&self) -> &[AgentInstance] {
        match self {
            Self::Call(agents) => agents,
            Self::Done => &[],
        }
    }
}

/// Shape of the orchestration graph a planner drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Sequential,
    Parallel,
    Loop,
    Conditional,
    Custom,
}

/// Context handed to [`crate::domain::ports::Planner::init`].
#[derive(Debug, Clone, Copy)]
pub struct InitPlanningContext<'a> {
    pub scope: &'a ExecutionScope,
    pub planner_agent: Option<&'a AgentInstance>,
    pub subagents: &'a [AgentInstance],
}

/// Observed just before an agent runs.
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub agent_name: &'a str,
    pub agent_id: Option<&'a str>,
    pub inputs: &'a HashMap<String, Value>,
    pub scope: &'a ExecutionScope,
}

/// Observed after an agent returned successfully.
#[derive(Debug, Clone, Copy)]
pub struct AgentResponse<'a> {
    pub agent_name: &'a str,
    pub agent_id: Option<&'a str>,
    pub inputs: &'a HashMap<String, Value>,
    pub output: &'a Value,
    pub scope: &'a ExecutionScope,
}

/// Observed when an agent invocation failed.
#[derive(Debug, Clone, Copy)]
pub struct AgentFailure<'a> {
    pub agent_name: &'a str,
    pub agent_id: Option<&'a str>,
    pub error: &'a anyhow::Error,
    pub scope: &'a ExecutionScope,
}
