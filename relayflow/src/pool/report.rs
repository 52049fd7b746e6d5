//! Aggregate outcome of a pool run.

use crate::errors::PoolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared by the workers of one run.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    started: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl RunCounters {
    pub(crate) fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    pub(crate) fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub(crate) fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Summary of a completed pool run.
///
/// Per-task errors are not kept; the pool's contract is pass/fail in
/// aggregate. Tasks that need diagnostics report through their own channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier, also recorded on the run's tracing span.
    pub run_id: String,
    /// Tasks submitted.
    pub total: usize,
    /// Workers actually spawned.
    pub workers: usize,
    /// Effective error budget.
    pub max_errors: usize,
    /// Tasks handed to a worker.
    pub started: usize,
    /// Tasks that returned `Ok`.
    pub succeeded: usize,
    /// Tasks that returned an error or panicked.
    pub failed: usize,
    /// Tasks left in the queue when scheduling stopped.
    pub not_started: usize,
    /// Whether the error budget was exhausted.
    pub limit_exceeded: bool,
    /// Wall time of the run in milliseconds.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Report for an empty batch.
    #[must_use]
    pub(crate) fn empty(run_id: String, max_errors: usize) -> Self {
        Self {
            run_id,
            total: 0,
            workers: 0,
            max_errors,
            started: 0,
            succeeded: 0,
            failed: 0,
            not_started: 0,
            limit_exceeded: false,
            elapsed_ms: 0,
        }
    }

    /// Converts the report into the run's pass/fail outcome.
    pub fn outcome(&self) -> Result<(), PoolError> {
        if self.limit_exceeded {
            Err(PoolError::ErrorsLimitExceeded {
                max_errors: self.max_errors,
                failures: self.failed,
            })
        } else {
            Ok(())
        }
    }

    /// Returns the fraction of started tasks that succeeded.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.started == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.started as f64
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id));
        map.insert("total".to_string(), serde_json::json!(self.total));
        map.insert("workers".to_string(), serde_json::json!(self.workers));
        map.insert("max_errors".to_string(), serde_json::json!(self.max_errors));
        map.insert("started".to_string(), serde_json::json!(self.started));
        map.insert("succeeded".to_string(), serde_json::json!(self.succeeded));
        map.insert("failed".to_string(), serde_json::json!(self.failed));
        map.insert("not_started".to_string(), serde_json::json!(self.not_started));
        map.insert("limit_exceeded".to_string(), serde_json::json!(self.limit_exceeded));
        map.insert("success_rate".to_string(), serde_json::json!(self.success_rate()));
        map.insert("elapsed_ms".to_string(), serde_json::json!(self.elapsed_ms));
        map
    }
}
