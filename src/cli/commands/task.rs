//! Task inspection and maintenance commands.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::Cell;
use serde::Serialize;
use std::collections::HashMap;

use crate::cli::output::{colorize_status, list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{TaskEvent, TaskId, TaskMetadata, TaskStatus};
use crate::services::DurableTaskService;

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub agent_name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
    pub labels: HashMap<String, String>,
}

impl From<&TaskMetadata> for TaskSummary {
    fn from(metadata: &TaskMetadata) -> Self {
        Self {
            id: metadata.id().to_string(),
            agent_name: metadata.agent_name().to_string(),
            status: metadata.status(),
            created_at: metadata.created_at(),
            updated_at: metadata.updated_at(),
            failure_reason: metadata.failure_reason().map(str::to_string),
            labels: metadata.labels().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskSummary>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "agent", "status", "updated", "failure"]);
        for task in &self.tasks {
            table.add_row(vec![
                Cell::new(&task.id),
                Cell::new(&task.agent_name),
                Cell::new(colorize_status(task.status)),
                Cell::new(task.updated_at.format("%Y-%m-%d %H:%M:%S")),
                Cell::new(truncate(task.failure_reason.as_deref().unwrap_or("-"), 40)),
            ]);
        }
        render_list("task", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct CheckpointSummary {
    pub event_count: usize,
    pub taken_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub has_scope: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskDetailOutput {
    pub task: TaskSummary,
    pub event_count: usize,
    pub checkpoint: Option<CheckpointSummary>,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let task = &self.task;
        let mut lines = vec![format!("Task {}", task.id)];
        lines.push(format!("  Agent:      {}", task.agent_name));
        lines.push(format!("  Status:     {}", colorize_status(task.status)));
        lines.push(format!("  Created:    {}", task.created_at.to_rfc3339()));
        lines.push(format!("  Updated:    {}", task.updated_at.to_rfc3339()));
        if let Some(reason) = &task.failure_reason {
            lines.push(format!("  Failure:    {reason}"));
        }
        if !task.labels.is_empty() {
            let mut labels: Vec<String> =
                task.labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
            labels.sort();
            lines.push(format!("  Labels:     {}", labels.join(", ")));
        }
        lines.push(format!("  Events:     {}", self.event_count));
        match &self.checkpoint {
            Some(checkpoint) => lines.push(format!(
                "  Checkpoint: at event {} ({}, {}scope) taken {}",
                checkpoint.event_count,
                checkpoint.status,
                if checkpoint.has_scope { "with " } else { "no " },
                checkpoint.taken_at.to_rfc3339()
            )),
            None => lines.push("  Checkpoint: none".to_string()),
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct EventListOutput {
    pub task_id: String,
    pub events: Vec<TaskEvent>,
    pub total: usize,
}

impl CommandOutput for EventListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["#", "time", "type", "details"]);
        let offset = self.total - self.events.len();
        for (index, event) in self.events.iter().enumerate() {
            table.add_row(vec![
                Cell::new(offset + index + 1),
                Cell::new(event.time.format("%Y-%m-%d %H:%M:%S%.3f")),
                Cell::new(event.type_name()),
                Cell::new(truncate(&event.summary(), 60)),
            ]);
        }
        render_list("event", &table, self.events.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct RecoverOutput {
    pub recovered: Vec<String>,
}

impl CommandOutput for RecoverOutput {
    fn to_human(&self) -> String {
        if self.recovered.is_empty() {
            return "No interrupted tasks found.".to_string();
        }
        let mut lines = vec![format!("Paused {} interrupted task(s):", self.recovered.len())];
        lines.extend(self.recovered.iter().map(|id| format!("  {id}")));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct PurgeOutput {
    pub task_id: String,
    pub deleted: bool,
    pub forced: bool,
}

impl CommandOutput for PurgeOutput {
    fn to_human(&self) -> String {
        match (self.deleted, self.forced) {
            (true, true) => format!("Force-deleted task {}", self.task_id),
            (true, false) => format!("Purged task {}", self.task_id),
            (false, _) => format!("Task {} not found", self.task_id),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn list(service: &DurableTaskService, status: Option<&str>, json_mode: bool) -> Result<()> {
    let status = match status {
        Some(raw) => Some(
            TaskStatus::from_str(raw).with_context(|| format!("Unknown task status: {raw}"))?,
        ),
        None => None,
    };

    let tasks: Vec<TaskSummary> = service
        .list_tasks(status)
        .await?
        .iter()
        .map(TaskSummary::from)
        .collect();
    let total = tasks.len();
    output(&TaskListOutput { tasks, total }, json_mode);
    Ok(())
}

pub async fn show(service: &DurableTaskService, task_id: &str, json_mode: bool) -> Result<()> {
    let task_id = TaskId::new(task_id);
    let Some(metadata) = service.metadata(&task_id).await? else {
        bail!("Task not found: {task_id}");
    };
    let event_count = service.store().event_count(&task_id).await?;
    let checkpoint = service
        .checkpoint(&task_id)
        .await?
        .map(|checkpoint| CheckpointSummary {
            event_count: checkpoint.event_count,
            taken_at: checkpoint.taken_at,
            status: checkpoint.metadata.status(),
            has_scope: checkpoint.serialized_scope.is_some(),
        });

    output(
        &TaskDetailOutput {
            task: TaskSummary::from(&metadata),
            event_count,
            checkpoint,
        },
        json_mode,
    );
    Ok(())
}

pub async fn events(
    service: &DurableTaskService,
    task_id: &str,
    limit: Option<usize>,
    json_mode: bool,
) -> Result<()> {
    let task_id = TaskId::new(task_id);
    let mut events = service.events(&task_id).await?;
    let total = events.len();
    if let Some(limit) = limit {
        events.drain(..total.saturating_sub(limit));
    }

    output(
        &EventListOutput {
            task_id: task_id.to_string(),
            events,
            total,
        },
        json_mode,
    );
    Ok(())
}

pub async fn recover(service: &DurableTaskService, json_mode: bool) -> Result<()> {
    let mut recovered: Vec<String> = service
        .recover_interrupted_tasks()
        .await?
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    recovered.sort();
    output(&RecoverOutput { recovered }, json_mode);
    Ok(())
}

pub async fn purge(
    service: &DurableTaskService,
    task_id: &str,
    force: bool,
    json_mode: bool,
) -> Result<()> {
    let task_id = TaskId::new(task_id);
    let deleted = if force {
        service.store().delete(&task_id).await?
    } else {
        service.cleanup(&task_id).await?
    };

    output(
        &PurgeOutput {
            task_id: task_id.to_string(),
            deleted,
            forced: force,
        },
        json_mode,
    );
    Ok(())
}
