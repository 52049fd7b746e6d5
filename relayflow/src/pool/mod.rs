//! Bounded worker pool.
//!
//! This module provides:
//! - Task, an opaque run-once unit of work
//! - ErrorBudget, the shared failure counter
//! - WorkerPool and the `run` shorthand
//! - RunReport with per-run counters

mod budget;
mod queue;
mod report;
mod task;
mod worker_pool;

pub use budget::ErrorBudget;
pub use report::RunReport;
pub use task::{Task, TaskFuture};
pub use worker_pool::{run, WorkerPool};
