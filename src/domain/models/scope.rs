//! Execution scope: the orchestrator-owned key/value state of one task.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Key/value execution state shared across the steps of one task.
///
/// Owned by the orchestrator. The durable core only reads it when taking a
/// checkpoint and writes into it when replaying resume-time input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionScope {
    state: HashMap<String, Value>,
}

impl ExecutionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a scope from the string stored in a checkpoint.
    pub fn from_serialized(serialized: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(serialized)
    }

    /// Write (or overwrite) a value.
    pub fn write_state(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    pub fn read_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn has_state(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.state.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn state(&self) -> &HashMap<String, Value> {
        &self.state
    }
}

impl From<HashMap<String, Value>> for ExecutionScope {
    fn from(state: HashMap<String, Value>) -> Self {
        Self { state }
    }
}
