//! Port trait definitions (Hexagonal Architecture)
//!
//! - `TaskExecutionStore`: metadata, journal and checkpoint persistence
//! - `AgentListener`: agent-invocation lifecycle observer
//! - `Planner`: planning policy driven by the orchestrator
//! - `CheckpointHook`: checkpoint callback used by the journaling listener
//! - `TaskWorkflow`: the work a durable task runs

pub mod agent_listener;
pub mod checkpoint_hook;
pub mod errors;
pub mod planner;
pub mod task_store;
pub mod workflow;

pub use agent_listener::AgentListener;
pub use checkpoint_hook::CheckpointHook;
pub use errors::StoreError;
pub use planner::Planner;
pub use task_store::TaskExecutionStore;
pub use workflow::TaskWorkflow;
