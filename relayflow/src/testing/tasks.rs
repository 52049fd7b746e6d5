//! Synthetic tasks.

use crate::pool::Task;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A task that succeeds immediately.
#[must_use]
pub fn succeed() -> Task {
    Task::new(|| async { Ok(()) })
}

/// A task that fails immediately with `message`.
#[must_use]
pub fn fail(message: impl Into<String>) -> Task {
    let message = message.into();
    Task::new(move || async move { Err(anyhow::anyhow!(message)) })
}

/// A task that sleeps, then succeeds or fails.
#[must_use]
pub fn sleep_then(duration: Duration, succeed: bool) -> Task {
    Task::new(move || async move {
        tokio::time::sleep(duration).await;
        if succeed {
            Ok(())
        } else {
            Err(anyhow::anyhow!("failed after {duration:?}"))
        }
    })
}

/// Builds `total` tasks where the 1-based positions in `failures` fail.
#[must_use]
pub fn failing_at(total: usize, failures: &[usize]) -> Vec<Task> {
    let failures: HashSet<usize> = failures.iter().copied().collect();
    (1..=total)
        .map(|position| {
            let task = if failures.contains(&position) {
                fail(format!("task #{position} failed"))
            } else {
                succeed()
            };
            task.with_name(format!("task-{position}"))
        })
        .collect()
}

/// Records how many probe tasks started and how many ran at once.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ConcurrencyProbe {
    /// Creates a shared probe.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A task that registers with the probe, sleeps, then succeeds or fails.
    #[must_use]
    pub fn task(self: &Arc<Self>, duration: Duration, succeed: bool) -> Task {
        let probe = self.clone();
        Task::new(move || async move {
            probe.started.fetch_add(1, Ordering::SeqCst);
            let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            probe.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(duration).await;

            probe.in_flight.fetch_sub(1, Ordering::SeqCst);
            if succeed {
                Ok(())
            } else {
                Err(anyhow::anyhow!("probe task failed"))
            }
        })
    }

    /// Tasks that began executing.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Highest number of probe tasks observed running together.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}
