//! Checkpoint model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{TaskId, TaskMetadata};

/// Point-in-time snapshot of a task used to speed up resumption.
///
/// `event_count` is the journal length when the snapshot was taken and acts
/// as the resume cursor. Only the latest checkpoint per task is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub task_id: TaskId,
    pub metadata: TaskMetadata,
    #[serde(default)]
    pub serialized_scope: Option<String>,
    pub event_count: usize,
    pub taken_at: DateTime<Utc>,
}

/// When checkpoints are taken automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointPolicy {
    /// Never checkpoint automatically
    None,
    /// After every successful agent invocation (and when the root call completes)
    #[default]
    AfterEachAgent,
    /// Only when the root call completes
    AfterRootCall,
}

impl CheckpointPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AfterEachAgent => "after_each_agent",
            Self::AfterRootCall => "after_root_call",
        }
    }

    /// Whether the after-agent hook should be wired.
    pub fn checkpoints_after_agent(&self) -> bool {
        matches!(self, Self::AfterEachAgent)
    }

    /// Whether the root-call hook should be wired.
    pub fn checkpoints_after_root_call(&self) -> bool {
        matches!(self, Self::AfterEachAgent | Self::AfterRootCall)
    }
}
