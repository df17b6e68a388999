//! Durable execution core for long-running agent tasks
//!
//! Lets a multi-step agent invocation survive process restarts, be paused
//! and resumed, and be replayed up to the point it last reached without
//! re-running completed steps.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): task lifecycle, journal events, ports
//! - **Infrastructure Layer** (`infrastructure`): task stores, configuration, logging
//! - **Service Layer** (`services`): journaling, checkpoints, replay, task service
//! - **CLI Layer** (`cli`): operator inspection commands
//!
//! # Example
//!
//! ```ignore
//! use durable_tasks::{DurableTaskService, InMemoryTaskStore, TaskConfiguration, TaskId, WorkflowError};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = DurableTaskService::builder()
//!         .store(Arc::new(InMemoryTaskStore::new()))
//!         .build()?;
//!     let handle = service
//!         .start(TaskConfiguration::builder("writer").build(), |_task_id: TaskId| async {
//!             Ok::<_, WorkflowError>(serde_json::json!("done"))
//!         })
//!         .await?;
//!     println!("{}", handle.await_result().await?);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::error::{TaskError, WorkflowError};
pub use domain::models::{
    Action, AgentFailure, AgentInstance, AgentInvocation, AgentRequest, AgentResponse,
    Checkpoint, CheckpointPolicy, Config, ExecutionScope, InitPlanningContext, RetryPolicy,
    TaskConfiguration, TaskEvent, TaskEventKind, TaskId, TaskMetadata, TaskStatus, Topology,
};
pub use domain::ports::{
    AgentListener, CheckpointHook, Planner, StoreError, TaskExecutionStore, TaskWorkflow,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::store::{FileTaskStore, InMemoryTaskStore};
pub use services::{
    CheckpointManager, CheckpointOutcome, DurableTaskService, JournalingAgentListener,
    ReplayingPlanner, TaskHandle, TaskOutcome,
};
