//! Journal event model.
//!
//! Every state transition of a task is recorded as an immutable
//! [`TaskEvent`]. The per-task journal is the ordered, append-only sequence
//! of these events and is the source of truth for replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::task::TaskId;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

/// Envelope shared by every journal record.
///
/// Serialized as one flat JSON object, e.g.
/// `{"taskId":"..","time":"..","schemaVersion":1,"type":"task_started","initialInputs":{}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub time: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(flatten)]
    pub kind: TaskEventKind,
}

/// Event payloads, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TaskEventKind {
    TaskStarted {
        #[serde(default)]
        initial_inputs: HashMap<String, Value>,
    },
    AgentInvocationStarted {
        agent_name: String,
        #[serde(default)]
        agent_id: Option<String>,
        #[serde(default)]
        inputs: HashMap<String, Value>,
    },
    AgentInvocationCompleted {
        agent_name: String,
        #[serde(default)]
        agent_id: Option<String>,
        #[serde(default)]
        serialized_output: Option<String>,
    },
    AgentInvocationFailed {
        agent_name: String,
        #[serde(default)]
        agent_id: Option<String>,
        error_message: String,
        #[serde(default)]
        stack_trace: Option<String>,
    },
    TaskPaused {
        reason: String,
        #[serde(default)]
        pending_agent_name: Option<String>,
    },
    TaskResumed {
        #[serde(default)]
        user_input: HashMap<String, Value>,
    },
    TaskRetry {
        attempt: u32,
        max_retries: u32,
        error_message: String,
        delay_millis: u64,
    },
    TaskCompleted {
        #[serde(default)]
        serialized_result: Option<String>,
    },
    TaskFailed {
        error_message: String,
        #[serde(default)]
        stack_trace: Option<String>,
    },
    TaskCancelled,
}

impl TaskEventKind {
    /// The `type` discriminator written to the journal.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => "task_started",
            Self::AgentInvocationStarted { .. } => "agent_invocation_started",
            Self::AgentInvocationCompleted { .. } => "agent_invocation_completed",
            Self::AgentInvocationFailed { .. } => "agent_invocation_failed",
            Self::TaskPaused { .. } => "task_paused",
            Self::TaskResumed { .. } => "task_resumed",
            Self::TaskRetry { .. } => "task_retry",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskCancelled => "task_cancelled",
        }
    }
}

impl TaskEvent {
    /// Stamp a payload with the current time and schema version.
    pub fn now(task_id: TaskId, kind: TaskEventKind) -> Self {
        Self {
            task_id,
            time: Utc::now(),
            schema_version: CURRENT_SCHEMA_VERSION,
            kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Short human-readable summary used by logs and the CLI.
    pub fn summary(&self) -> String {
        match &self.kind {
            TaskEventKind::TaskStarted { initial_inputs } => {
                format!("{} input(s)", initial_inputs.len())
            }
            TaskEventKind::AgentInvocationStarted { agent_name, .. } => agent_name.clone(),
            TaskEventKind::AgentInvocationCompleted {
                agent_name,
                serialized_output,
                ..
            } => match serialized_output {
                Some(out) => format!("{agent_name} -> {out}"),
                None => agent_name.clone(),
            },
            TaskEventKind::AgentInvocationFailed {
                agent_name,
                error_message,
                ..
            } => format!("{agent_name}: {error_message}"),
            TaskEventKind::TaskPaused {
                reason,
                pending_agent_name,
            } => match pending_agent_name {
                Some(pending) => format!("{reason} (pending {pending})"),
                None => reason.clone(),
            },
            TaskEventKind::TaskResumed { user_input } => {
                let mut keys: Vec<&str> = user_input.keys().map(String::as_str).collect();
                keys.sort_unstable();
                format!("input keys [{}]", keys.join(", "))
            }
            TaskEventKind::TaskRetry {
                attempt,
                max_retries,
                error_message,
                delay_millis,
            } => format!("attempt {attempt}/{max_retries} in {delay_millis}ms: {error_message}"),
            TaskEventKind::TaskCompleted { serialized_result } => {
                serialized_result.clone().unwrap_or_default()
            }
            TaskEventKind::TaskFailed { error_message, .. } => error_message.clone(),
            TaskEventKind::TaskCancelled => String::new(),
        }
    }
}
