//! Handle to a running pipeline.

use super::relay::ExitLatch;
use super::stream::ValueStream;
use crate::cancellation::{JoinReport, UnitGroup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How a pipeline's output stream came to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The input ran out and every unit returned on its own.
    Exhausted,
    /// A relay observed the cancellation signal and cut the stream short.
    Cancelled,
    /// A stage panicked or was aborted at a join deadline, cutting the
    /// stream short without cancellation.
    Aborted,
}

/// A running pipeline: its output stream plus the units feeding it.
///
/// Reading the output drives the pipeline. Once [`recv`](Self::recv) has
/// returned `None`, [`termination`](Self::termination) says whether the end
/// was natural, caused by cancellation, or caused by a failed stage.
#[derive(Debug)]
pub struct Execution<T> {
    run_id: String,
    output: ValueStream<T>,
    units: UnitGroup,
    latch: Arc<ExitLatch>,
    join_timeout: Duration,
    closed: bool,
}

impl<T> Execution<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(
        run_id: String,
        output: ValueStream<T>,
        units: UnitGroup,
        latch: Arc<ExitLatch>,
        join_timeout: Duration,
    ) -> Self {
        Self {
            run_id,
            output,
            units,
            latch,
            join_timeout,
            closed: false,
        }
    }

    /// Returns the execution's run identifier.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Receives the next output value, or `None` once the output closed.
    pub async fn recv(&mut self) -> Option<T> {
        let next = self.output.recv().await;
        if next.is_none() {
            self.closed = true;
        }
        next
    }

    /// Reads every remaining output value until the output closes.
    pub async fn collect(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.recv().await {
            values.push(value);
        }
        values
    }

    /// Returns why the output closed, or `None` while it is still open.
    ///
    /// Cancellation takes precedence: units aborted while the pipeline was
    /// already shutting down on the signal do not change the answer.
    #[must_use]
    pub fn termination(&self) -> Option<Termination> {
        if !self.closed {
            return None;
        }
        if self.latch.is_cancelled() {
            Some(Termination::Cancelled)
        } else if self.latch.is_aborted() {
            Some(Termination::Aborted)
        } else {
            Some(Termination::Exhausted)
        }
    }

    /// Number of units spawned and not yet joined.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Waits for every unit to finish within `timeout`.
    ///
    /// Units only finish once the output has been drained or the signal has
    /// fired; joining an undrained, uncancelled pipeline times out.
    ///
    /// Units still running at the deadline are aborted, which latches the
    /// execution as [`Termination::Aborted`] unless it was cancelled.
    pub async fn join(&self, timeout: Duration) -> JoinReport {
        let report = self.units.join(timeout).await;
        if !report.timed_out.is_empty() {
            self.latch.trip_aborted();
        }
        report
    }

    /// Like [`join`](Self::join) with the configured default deadline.
    pub async fn join_default(&self) -> JoinReport {
        self.join(self.join_timeout).await
    }

    /// Gives up the handle and returns the bare output stream.
    ///
    /// The stream is a valid input to another pipeline. Units keep running
    /// detached until it is drained or the signal fires.
    #[must_use]
    pub fn into_stream(self) -> ValueStream<T> {
        self.output
    }
}
