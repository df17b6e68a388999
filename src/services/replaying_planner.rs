//! Deterministic resumption of a planning policy from the task journal.
//!
//! On the first `first_action` call the wrapper walks the journal once, in
//! order:
//!
//! - `TaskResumed` writes its user input into the scope (last write wins).
//! - `AgentInvocationCompleted` feeds the recorded output back into the
//!   delegate through `next_action`, advancing its cursor without invoking
//!   the agent again.
//!
//! The action left over after the walk is the first live one. If the journal
//! already covers every step of the delegate, that action is `Done`.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::domain::models::{
    Action, AgentInstance, AgentInvocation, ExecutionScope, InitPlanningContext, TaskEvent,
    TaskEventKind, Topology,
};
use crate::domain::ports::Planner;

/// Planner wrapper that fast-forwards its delegate through journaled steps.
pub struct ReplayingPlanner<P> {
    delegate: P,
    journal: Vec<TaskEvent>,
    subagents: Vec<AgentInstance>,
    replayed_count: usize,
    replay_complete: bool,
}

impl<P: Planner> ReplayingPlanner<P> {
    /// Wrap `delegate`, keeping `journal` untouched until the first action.
    pub fn new(delegate: P, journal: Vec<TaskEvent>) -> Self {
        let replay_complete = !journal.iter().any(|event| {
            matches!(
                event.kind,
                TaskEventKind::AgentInvocationCompleted { .. } | TaskEventKind::TaskResumed { .. }
            )
        });
        Self {
            delegate,
            journal,
            subagents: Vec::new(),
            replayed_count: 0,
            replay_complete,
        }
    }

    /// Number of completed invocations fed to the delegate from the journal.
    pub fn replayed_count(&self) -> usize {
        self.replayed_count
    }

    pub fn is_replay_complete(&self) -> bool {
        self.replay_complete
    }

    pub fn delegate(&self) -> &P {
        &self.delegate
    }

    pub fn into_inner(self) -> P {
        self.delegate
    }

    fn replay(&mut self, scope: &mut ExecutionScope) -> Action {
        let journal = std::mem::take(&mut self.journal);
        let mut current: Option<Action> = None;
        let mut pending_inputs: HashMap<String, HashMap<String, Value>> = HashMap::new();

        for event in &journal {
            match &event.kind {
                TaskEventKind::TaskResumed { user_input } => {
                    for (key, value) in user_input {
                        scope.write_state(key.clone(), value.clone());
                    }
                    debug!(task_id = %event.task_id, keys = user_input.len(), "Replayed resume input");
                }
                TaskEventKind::AgentInvocationStarted {
                    agent_name, inputs, ..
                } => {
                    pending_inputs.insert(agent_name.clone(), inputs.clone());
                }
                TaskEventKind::AgentInvocationCompleted {
                    agent_name,
                    agent_id,
                    serialized_output,
                } => {
                    let action = match current.take() {
                        Some(action) => action,
                        None => self.delegate.first_action(scope),
                    };
                    if action.is_done() {
                        warn!(
                            task_id = %event.task_id,
                            agent = %agent_name,
                            "Journal has more completed steps than the planner, ignoring"
                        );
                        current = Some(action);
                        continue;
                    }

                    let output = deserialize_output(serialized_output.as_deref());
                    if let Some(key) = self.output_key(&action, agent_name, agent_id.as_deref()) {
                        scope.write_state(key, output.clone());
                    }

                    let invocation = AgentInvocation {
                        agent_name: agent_name.clone(),
                        agent_id: agent_id.clone(),
                        inputs: pending_inputs.remove(agent_name).unwrap_or_default(),
                        output,
                    };
                    self.replayed_count += 1;
                    debug!(
                        task_id = %event.task_id,
                        agent = %agent_name,
                        replayed = self.replayed_count,
                        "Replayed completed invocation"
                    );
                    current = Some(self.delegate.next_action(scope, &invocation));
                }
                _ => {}
            }
        }

        self.journal = journal;
        self.replay_complete = true;
        info!(replayed = self.replayed_count, "Replay complete");

        match current {
            Some(action) => action,
            None => self.delegate.first_action(scope),
        }
    }

    /// Scope key for a replayed output: the sub-agent registered at `init`
    /// (matched by id, then by name), else the agent in the pending action.
    fn output_key(&self, action: &Action, agent_name: &str, agent_id: Option<&str>) -> Option<String> {
        let find = |agents: &[AgentInstance]| {
            agent_id
                .and_then(|id| agents.iter().find(|a| a.agent_id.as_deref() == Some(id)))
                .or_else(|| agents.iter().find(|a| a.name == agent_name))
                .and_then(|a| a.output_key.clone())
        };
        find(&self.subagents).or_else(|| find(action.agents()))
    }
}

fn deserialize_output(serialized: Option<&str>) -> Value {
    match serialized {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        None => Value::Null,
    }
}

impl<P: Planner> Planner for ReplayingPlanner<P> {
    fn init(&mut self, context: InitPlanningContext<'_>) {
        self.subagents = context.subagents.to_vec();
        self.delegate.init(context);
    }

    fn first_action(&mut self, scope: &mut ExecutionScope) -> Action {
        if self.replay_complete {
            return self.delegate.first_action(scope);
        }
        self.replay(scope)
    }

    fn next_action(&mut self, scope: &mut ExecutionScope, last: &AgentInvocation) -> Action {
        self.delegate.next_action(scope, last)
    }

    fn topology(&self) -> Topology {
        self.delegate.topology()
    }

    fn terminated(&self) -> bool {
        self.delegate.terminated()
    }
}
