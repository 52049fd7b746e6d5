//! Configuration types for the worker pool and the pipeline.

use crate::errors::{RelayflowError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`WorkerPool`](crate::pool::WorkerPool) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent workers. Clamped to the batch size at run time.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Failures tolerated before scheduling stops. Negative means zero.
    #[serde(default)]
    pub max_errors: i64,
}

fn default_worker_count() -> usize {
    4
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_errors: 0,
        }
    }
}

impl PoolConfig {
    /// Creates a new pool configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Sets the error budget.
    #[must_use]
    pub fn with_max_errors(mut self, max_errors: i64) -> Self {
        self.max_errors = max_errors;
        self
    }

    /// Returns the error budget with negative values clamped to zero.
    #[must_use]
    pub fn effective_max_errors(&self) -> usize {
        usize::try_from(self.max_errors.max(0)).unwrap_or(usize::MAX)
    }

    /// Returns how many workers to spawn for a batch of `task_count` tasks.
    ///
    /// Never more workers than tasks. A zero worker count with pending work
    /// still gets one worker so the batch cannot stall.
    #[must_use]
    pub fn effective_worker_count(&self, task_count: usize) -> usize {
        if task_count == 0 {
            return 0;
        }
        self.worker_count.clamp(1, task_count)
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Buffer size of every queue the pipeline allocates between units.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Default deadline used by [`Execution::join_default`](crate::pipeline::Execution::join_default).
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

fn default_channel_capacity() -> usize {
    1
}

fn default_join_timeout_ms() -> u64 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new pipeline configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-hop channel capacity.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Sets the default join deadline.
    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the join deadline as a duration.
    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Checks that the configuration can be used to build channels.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(RelayflowError::config(
                "channel_capacity must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parses and validates a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pool_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_errors, 0);
    }

    #[test]
    fn test_negative_budget_clamps_to_zero() {
        let config = PoolConfig::new().with_max_errors(-1);
        assert_eq!(config.effective_max_errors(), 0);

        let config = PoolConfig::new().with_max_errors(3);
        assert_eq!(config.effective_max_errors(), 3);
    }

    #[test]
    fn test_worker_count_clamped_to_batch() {
        let config = PoolConfig::new().with_worker_count(10);
        assert_eq!(config.effective_worker_count(3), 3);
        assert_eq!(config.effective_worker_count(0), 0);

        let config = PoolConfig::new().with_worker_count(0);
        assert_eq!(config.effective_worker_count(5), 1);
    }

    #[test]
    fn test_pool_from_json_uses_defaults() {
        let config = PoolConfig::from_json(r#"{"max_errors": 2}"#).unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_errors, 2);
    }

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.join_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_rejects_zero_capacity() {
        let config = PipelineConfig::new().with_channel_capacity(0);
        assert!(config.validate().is_err());
        assert!(PipelineConfig::from_json(r#"{"channel_capacity": 0}"#).is_err());
    }

    #[test]
    fn test_pipeline_from_json() {
        let config =
            PipelineConfig::from_json(r#"{"channel_capacity": 8, "join_timeout_ms": 250}"#)
                .unwrap();
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.join_timeout(), Duration::from_millis(250));
    }
}
