//! Shared error budget for one pool run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counting semaphore of tolerated failures, floored at zero.
///
/// Each failure consumes one unit. The failure that finds the budget already
/// at zero exhausts it, so a budget of `M` trips on failure `M + 1`.
/// Decrement-and-test is a single atomic update: two workers failing at the
/// boundary cannot both see the budget as intact.
#[derive(Debug)]
pub struct ErrorBudget {
    limit: usize,
    remaining: AtomicUsize,
    exhausted: AtomicBool,
}

impl ErrorBudget {
    /// Creates a budget tolerating `limit` failures.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            remaining: AtomicUsize::new(limit),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Records one failure.
    ///
    /// Returns `true` while the failure still fits in the budget, and
    /// `false` once the budget is exhausted.
    pub fn record_failure(&self) -> bool {
        let consumed = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok();

        if !consumed {
            self.exhausted.store(true, Ordering::Release);
        }
        consumed
    }

    /// Returns true once a failure found the budget empty.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    /// Failures still tolerated.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// The configured budget.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}
