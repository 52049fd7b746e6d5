//! Tracking for the concurrent units an engine spawns.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::warn;

/// Outcome of joining every unit in a [`UnitGroup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReport {
    /// Units that returned normally.
    pub finished: Vec<String>,
    /// Units that panicked.
    pub panicked: Vec<String>,
    /// Units still running at the deadline. They are aborted.
    pub timed_out: Vec<String>,
}

impl JoinReport {
    /// Returns true if every unit returned normally before the deadline.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.panicked.is_empty() && self.timed_out.is_empty()
    }

    /// Total number of units accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.finished.len() + self.panicked.len() + self.timed_out.len()
    }
}

/// A group of named tokio tasks that can be joined under a single deadline.
#[derive(Default)]
pub struct UnitGroup {
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl UnitGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a unit on the current runtime and tracks it.
    pub fn spawn<F>(&self, name: impl Into<String>, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(unit);
        self.handles.lock().push((name.into(), handle));
    }

    /// Returns the number of units not yet joined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns true if there are no units left to join.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Waits for every unit to finish, giving up at `timeout` from now.
    ///
    /// Units still running at the deadline are aborted and reported as timed
    /// out. Calling this twice reports only units spawned in between.
    pub async fn join(&self, timeout: Duration) -> JoinReport {
        let handles: Vec<_> = {
            let mut lock = self.handles.lock();
            std::mem::take(&mut *lock)
        };

        let deadline = Instant::now() + timeout;
        let mut report = JoinReport::default();

        for (name, mut handle) in handles {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.finished.push(name),
                Ok(Err(join_error)) if join_error.is_panic() => {
                    warn!(unit = %name, "unit panicked");
                    report.panicked.push(name);
                }
                // Aborted from outside; it is gone either way.
                Ok(Err(_)) => report.finished.push(name),
                Err(_) => {
                    warn!(unit = %name, ?timeout, "unit still running at join deadline, aborting");
                    handle.abort();
                    report.timed_out.push(name);
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for UnitGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitGroup")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_all_finished() {
        let group = UnitGroup::new();
        group.spawn("a", async {});
        group.spawn("b", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
        });
        assert_eq!(group.len(), 2);

        let report = group.join(Duration::from_secs(1)).await;
        assert!(report.is_clean());
        assert_eq!(report.finished, vec!["a".to_string(), "b".to_string()]);
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_join_reports_panics() {
        let group = UnitGroup::new();
        group.spawn("boom", async { panic!("unit failure") });

        let report = group.join(Duration::from_secs(1)).await;
        assert_eq!(report.panicked, vec!["boom".to_string()]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_join_times_out_stuck_unit() {
        let group = UnitGroup::new();
        group.spawn("stuck", futures::future::pending::<()>());

        let report = group.join(Duration::from_millis(20)).await;
        assert_eq!(report.timed_out, vec!["stuck".to_string()]);
        assert_eq!(report.total(), 1);
    }
}
