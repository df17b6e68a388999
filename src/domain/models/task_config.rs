//! Per-task configuration: identity, checkpointing, retries and timeout.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::checkpoint::CheckpointPolicy;
use crate::domain::error::{TaskError, WorkflowError};

type RetryPredicate = Arc<dyn Fn(&WorkflowError) -> bool + Send + Sync>;

/// Retry policy with exponential backoff for failed workflow attempts.
///
/// Backoff for attempt `n` (1-based) is
/// `min(initial_delay * multiplier^(n-1), max_delay)`.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    retryable: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            retryable: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("multiplier", &self.multiplier)
            .field("max_delay", &self.max_delay)
            .field("custom_predicate", &self.retryable.is_some())
            .finish()
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retrying after failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let max_millis = self.max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= max_millis {
            return self.max_delay;
        }
        Duration::from_millis(millis as u64)
    }

    /// Whether a failure may be retried. Pauses never are.
    pub fn is_retryable(&self, error: &WorkflowError) -> bool {
        if error.is_pause() {
            return false;
        }
        self.retryable.as_ref().is_none_or(|predicate| predicate(error))
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Only retry failures accepted by `predicate`.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&WorkflowError) -> bool + Send + Sync + 'static,
    {
        self.policy.retryable = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> Result<RetryPolicy, TaskError> {
        let policy = self.policy;
        if !(policy.multiplier >= 1.0) {
            return Err(TaskError::InvalidConfiguration(format!(
                "multiplier must be >= 1.0, got {}",
                policy.multiplier
            )));
        }
        if policy.initial_delay > policy.max_delay {
            return Err(TaskError::InvalidConfiguration(format!(
                "initial_delay ({:?}) must not exceed max_delay ({:?})",
                policy.initial_delay, policy.max_delay
            )));
        }
        Ok(policy)
    }
}

/// Configuration for starting or resuming a task.
#[derive(Debug, Clone)]
pub struct TaskConfiguration {
    pub agent_name: String,
    pub labels: HashMap<String, String>,
    pub initial_inputs: HashMap<String, Value>,
    pub checkpoint_policy: Option<CheckpointPolicy>,
    pub retry_policy: Option<RetryPolicy>,
    pub timeout: Option<Duration>,
}

impl TaskConfiguration {
    pub fn builder(agent_name: impl Into<String>) -> TaskConfigurationBuilder {
        TaskConfigurationBuilder {
            config: Self {
                agent_name: agent_name.into(),
                labels: HashMap::new(),
                initial_inputs: HashMap::new(),
                checkpoint_policy: None,
                retry_policy: None,
                timeout: None,
            },
        }
    }
}

/// Builder for [`TaskConfiguration`].
pub struct TaskConfigurationBuilder {
    config: TaskConfiguration,
}

impl TaskConfigurationBuilder {
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.labels.insert(key.into(), value.into());
        self
    }

    pub fn input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.initial_inputs.insert(key.into(), value);
        self
    }

    pub fn checkpoint_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.config.checkpoint_policy = Some(policy);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = Some(policy);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> TaskConfiguration {
        self.config
    }
}
