//! Bounded worker pool with an error-budget circuit breaker.

use super::budget::ErrorBudget;
use super::queue::TaskQueue;
use super::report::{RunCounters, RunReport};
use super::Task;
use crate::config::PoolConfig;
use crate::errors::PoolError;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs a fixed batch of tasks on a bounded number of workers.
///
/// Workers pull tasks in FIFO order from a queue loaded with the whole batch.
/// Once more than `max_errors` tasks have failed, no new task is started;
/// tasks already running are left to finish.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    /// Creates a pool from a configuration.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Creates a pool with the given worker count and error budget.
    #[must_use]
    pub fn with_limits(worker_count: usize, max_errors: i64) -> Self {
        Self::new(
            PoolConfig::new()
                .with_worker_count(worker_count)
                .with_max_errors(max_errors),
        )
    }

    /// Returns the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Runs the batch and returns its pass/fail outcome.
    ///
    /// Succeeds when at most `max_errors` tasks failed, even if some did.
    pub async fn run(&self, tasks: Vec<Task>) -> Result<(), PoolError> {
        self.run_with_report(tasks).await.outcome()
    }

    /// Runs the batch and returns the full report.
    ///
    /// Workers are owned by the returned future: dropping it, for instance
    /// under an outer timeout, aborts them and no further task starts.
    pub async fn run_with_report(&self, tasks: Vec<Task>) -> RunReport {
        let run_id = Uuid::now_v7().to_string();
        let max_errors = self.config.effective_max_errors();
        let total = tasks.len();

        if total == 0 {
            debug!(run_id = %run_id, "empty batch, nothing to run");
            return RunReport::empty(run_id, max_errors);
        }

        let workers = self.config.effective_worker_count(total);
        if self.config.worker_count == 0 {
            warn!(run_id = %run_id, "worker_count is 0, running with a single worker");
        }

        let span = info_span!("pool_run", run_id = %run_id, total, workers, max_errors);
        async move {
            info!("starting pool run");
            let started_at = Instant::now();

            let queue = Arc::new(TaskQueue::load(tasks));
            let budget = Arc::new(ErrorBudget::new(max_errors));
            let counters = Arc::new(RunCounters::default());

            // Dropping the set aborts every worker, so a caller that gives up
            // on the run future leaves nothing pulling from the queue.
            let mut set = JoinSet::new();
            for worker_id in 0..workers {
                set.spawn(
                    worker_loop(worker_id, queue.clone(), budget.clone(), counters.clone())
                        .in_current_span(),
                );
            }

            while let Some(result) = set.join_next().await {
                if let Err(join_error) = result {
                    warn!(error = %join_error, "worker terminated abnormally");
                }
            }

            let report = RunReport {
                run_id: run_id.clone(),
                total,
                workers,
                max_errors,
                started: counters.started(),
                succeeded: counters.succeeded(),
                failed: counters.failed(),
                not_started: queue.remaining(),
                limit_exceeded: budget.is_exhausted(),
                elapsed_ms: u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            };

            if report.limit_exceeded {
                warn!(
                    failed = report.failed,
                    not_started = report.not_started,
                    "errors limit exceeded, pool run aborted"
                );
            } else {
                info!(
                    succeeded = report.succeeded,
                    failed = report.failed,
                    elapsed_ms = report.elapsed_ms,
                    "pool run completed"
                );
            }
            report
        }
        .instrument(span)
        .await
    }
}

/// Pulls tasks until the queue drains or the error budget is exhausted.
async fn worker_loop(
    worker_id: usize,
    queue: Arc<TaskQueue>,
    budget: Arc<ErrorBudget>,
    counters: Arc<RunCounters>,
) {
    loop {
        if budget.is_exhausted() {
            debug!(worker_id, "error budget exhausted, worker stopping");
            return;
        }

        let Some(task) = queue.pop() else {
            debug!(worker_id, "queue drained, worker stopping");
            return;
        };

        counters.record_start();
        let task_name = task.name().unwrap_or("unnamed").to_string();

        match task.execute().await {
            Ok(()) => counters.record_success(),
            Err(e) => {
                counters.record_failure();
                debug!(worker_id, task = %task_name, error = %e, "task failed");

                if !budget.record_failure() {
                    debug!(worker_id, "failure exceeded error budget, worker stopping");
                    return;
                }
            }
        }
    }
}

/// Runs `tasks` on `worker_count` workers, tolerating `max_errors` failures.
///
/// Shorthand for [`WorkerPool::with_limits`] followed by [`WorkerPool::run`].
pub async fn run(tasks: Vec<Task>, worker_count: usize, max_errors: i64) -> Result<(), PoolError> {
    WorkerPool::with_limits(worker_count, max_errors)
        .run(tasks)
        .await
}
