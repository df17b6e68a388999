//! Task domain model.
//!
//! A task is one durable, long-running agent invocation. Its lifecycle is
//! tracked by [`TaskMetadata`], whose status only moves through
//! [`TaskStatus::valid_transitions`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::error::TaskError;

/// Opaque task identifier, used as the join key across metadata, journal
/// and checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an existing identifier value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status of a durable task.
///
/// ```text
/// Created → Running ⇄ Paused
///              ↓ ↑
///           Retrying
/// Running → Completed | Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, not yet executing
    #[default]
    Created,
    /// Workflow is executing
    Running,
    /// Suspended, waiting for a resume (possibly with external input)
    Paused,
    /// Between attempts after a retryable failure
    Retrying,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled by a caller or a timeout
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [Self; 7] = [
        Self::Created,
        Self::Running,
        Self::Paused,
        Self::Retrying,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "retrying" => Some(Self::Retrying),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if a worker is (or should be) executing the task.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Retrying)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Created => &[Self::Running, Self::Cancelled],
            Self::Running => &[
                Self::Paused,
                Self::Retrying,
                Self::Completed,
                Self::Failed,
                Self::Cancelled,
            ],
            Self::Paused => &[Self::Running, Self::Cancelled],
            Self::Retrying => &[Self::Running, Self::Paused, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative lifecycle record for a task.
///
/// Values are immutable: every change produces a new `TaskMetadata`, so a
/// copy stored inside a checkpoint can never be affected by later updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    id: TaskId,
    agent_name: String,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
}

impl TaskMetadata {
    /// Metadata for a freshly submitted task, in [`TaskStatus::Created`].
    pub fn create(id: TaskId, agent_name: impl Into<String>, labels: HashMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            agent_name: agent_name.into(),
            status: TaskStatus::Created,
            created_at: now,
            updated_at: now,
            failure_reason: None,
            labels,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    /// Apply a status transition, returning the updated value.
    ///
    /// `failure_reason` is recorded only when moving to
    /// [`TaskStatus::Failed`]; any other transition clears it.
    pub fn transition_to(
        &self,
        next: TaskStatus,
        failure_reason: Option<String>,
    ) -> Result<Self, TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }

        let failure_reason = if next == TaskStatus::Failed {
            failure_reason
        } else {
            None
        };

        Ok(Self {
            status: next,
            updated_at: Utc::now().max(self.created_at),
            failure_reason,
            ..self.clone()
        })
    }

    /// Return a copy carrying an extra label.
    pub fn with_label(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut labels = self.labels.clone();
        labels.insert(key.into(), value.into());
        Self {
            labels,
            updated_at: Utc::now().max(self.created_at),
            ..self.clone()
        }
    }
}
