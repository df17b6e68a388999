//! Infrastructure layer module
//!
//! Adapters satisfying the domain ports, plus process-level setup:
//! - Task stores (in-memory and file-backed)
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;
pub mod store;
