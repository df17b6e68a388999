pub mod checkpoint_manager;
pub mod journaling_listener;
pub mod replaying_planner;
pub mod task_handle;
pub mod task_service;

pub use checkpoint_manager::{CheckpointManager, CheckpointOutcome, StoreCheckpointHook};
pub use journaling_listener::JournalingAgentListener;
pub use replaying_planner::ReplayingPlanner;
pub use task_handle::{CancellationHook, TaskHandle, TaskOutcome};
pub use task_service::{DurableTaskService, DurableTaskServiceBuilder, RECOVERY_REASON};
