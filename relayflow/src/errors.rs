//! Error types for the relayflow engines.
//!
//! The worker pool reports at most one terminal condition per run, and the
//! pipeline never fails at all: closing its output stream is the only way
//! it ends. Everything else here covers configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience alias for results carrying a [`RelayflowError`].
pub type Result<T> = std::result::Result<T, RelayflowError>;

/// The main error type for relayflow operations.
#[derive(Debug, Error)]
pub enum RelayflowError {
    /// A worker pool run ended with a terminal failure.
    #[error("{0}")]
    Pool(#[from] PoolError),

    /// A configuration value was rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Logging could not be initialised.
    #[error("Logging initialisation failed: {0}")]
    Logging(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayflowError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Terminal failure of a worker pool run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PoolError {
    /// More than `max_errors` tasks failed, so scheduling stopped early.
    ///
    /// `failures` is the number of failed tasks observed by the time every
    /// worker had exited; it is always greater than `max_errors`.
    #[error("errors limit exceeded")]
    ErrorsLimitExceeded {
        /// The effective error budget (negative input clamped to zero).
        max_errors: usize,
        /// Failures counted before all workers stopped.
        failures: usize,
    },
}

impl PoolError {
    /// Returns true for the errors-limit-exceeded condition.
    #[must_use]
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::ErrorsLimitExceeded { .. })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::ErrorsLimitExceeded { max_errors, failures } => {
                map.insert("type".to_string(), serde_json::json!("ErrorsLimitExceeded"));
                map.insert("max_errors".to_string(), serde_json::json!(max_errors));
                map.insert("failures".to_string(), serde_json::json!(failures));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}
