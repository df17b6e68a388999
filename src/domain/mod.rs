//! Domain layer for the durable task runtime
//!
//! This module contains the task lifecycle model, journal events and the
//! port traits infrastructure adapters implement.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::{TaskError, WorkflowError};
pub use ports::errors::StoreError;
