pub mod agentic;
pub mod checkpoint;
pub mod config;
pub mod event;
pub mod scope;
pub mod task;
pub mod task_config;

pub use agentic::{
    Action, AgentFailure, AgentInstance, AgentInvocation, AgentRequest, AgentResponse,
    InitPlanningContext, Topology,
};
pub use checkpoint::{Checkpoint, CheckpointPolicy};
pub use config::{
    CheckpointConfig, Config, LoggingConfig, RetryConfig, StoreBackend, StoreConfig,
    TaskDefaultsConfig,
};
pub use event::{TaskEvent, TaskEventKind, CURRENT_SCHEMA_VERSION};
pub use scope::ExecutionScope;
pub use task::{TaskId, TaskMetadata, TaskStatus};
pub use task_config::{RetryPolicy, RetryPolicyBuilder, TaskConfiguration, TaskConfigurationBuilder};
