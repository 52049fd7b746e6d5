//! Cancellation-enforcing relays and the stage decorator built on them.

use super::stage::Stage;
use super::stream::{channel, StreamSender, ValueStream};
use crate::cancellation::{CancellationSignal, UnitGroup};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn, Instrument, Span};

/// Why a relay stopped forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayExit {
    /// Upstream closed; every value was forwarded.
    Exhausted,
    /// The cancellation signal fired.
    Cancelled,
    /// The downstream reader went away.
    DownstreamClosed,
}

/// Records why the units of one execution stopped early, if they did.
///
/// Both flags are set before the affected unit drops its sender, so a
/// reader that sees the output close also sees the cause.
#[derive(Debug, Default)]
pub(crate) struct ExitLatch {
    cancelled: AtomicBool,
    aborted: AtomicBool,
}

impl ExitLatch {
    pub(crate) fn trip_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn trip_aborted(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Forwards values from `input` to `output` until upstream closes, the
/// downstream reader leaves, or `cancel` fires.
///
/// Cancellation is raced against both the read and the write: a value read
/// just before the signal fires is dropped rather than forwarded, and a
/// downstream that stopped reading cannot hold the relay forever. `output`
/// is dropped on return, which closes the downstream stream exactly once.
pub async fn relay<T>(
    mut input: ValueStream<T>,
    output: StreamSender<T>,
    cancel: CancellationSignal,
) -> RelayExit
where
    T: Send,
{
    forward(&mut input, &output, &cancel).await
}

async fn forward<T>(
    input: &mut ValueStream<T>,
    output: &StreamSender<T>,
    cancel: &CancellationSignal,
) -> RelayExit
where
    T: Send,
{
    loop {
        let value = tokio::select! {
            biased;
            () = cancel.fired() => return RelayExit::Cancelled,
            next = input.recv() => match next {
                Some(value) => value,
                None => return RelayExit::Exhausted,
            },
        };

        tokio::select! {
            biased;
            () = cancel.fired() => return RelayExit::Cancelled,
            sent = output.send(value) => {
                if sent.is_err() {
                    return RelayExit::DownstreamClosed;
                }
            }
        }
    }
}

/// Spawns a relay unit in `units` and returns the guarded stream.
pub(crate) fn spawn_relay<T>(
    name: String,
    mut input: ValueStream<T>,
    capacity: usize,
    cancel: CancellationSignal,
    latch: Arc<ExitLatch>,
    units: &UnitGroup,
    span: &Span,
) -> ValueStream<T>
where
    T: Send + 'static,
{
    let (tx, rx) = channel(capacity);
    let unit_name = name.clone();
    let unit = async move {
        let exit = forward(&mut input, &tx, &cancel).await;
        // Latch before the close so a reader seeing the end also sees why.
        if exit == RelayExit::Cancelled {
            latch.trip_cancelled();
        }
        drop(tx);
        drop(input);
        debug!(relay = %name, ?exit, "relay stopped");
    };
    units.spawn(unit_name, unit.instrument(span.clone()));
    rx
}

/// Decorator that puts a relay in front of a stage.
///
/// The wrapped stage only ever sees values the relay let through, and its
/// input closes as soon as the relay observes cancellation, whether or not
/// the stage itself watches the signal.
pub(crate) struct Guarded<T>
where
    T: Send + 'static,
{
    stage: Arc<dyn Stage<T>>,
    cancel: CancellationSignal,
}

impl<T> Guarded<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(stage: Arc<dyn Stage<T>>, cancel: CancellationSignal) -> Self {
        Self { stage, cancel }
    }

    /// Spawns the relay and the stage as two units and returns the stage's
    /// output stream.
    ///
    /// The unit keeps its own handle on the stage's sender, so a stage that
    /// panics is latched as aborted before its output closes. The panic is
    /// then resumed and shows up in the join report.
    pub(crate) fn spawn(
        &self,
        index: usize,
        input: ValueStream<T>,
        capacity: usize,
        latch: &Arc<ExitLatch>,
        units: &UnitGroup,
        span: &Span,
    ) -> ValueStream<T> {
        let guarded = spawn_relay(
            format!("relay-{index}"),
            input,
            capacity,
            self.cancel.clone(),
            latch.clone(),
            units,
            span,
        );

        let (tx, rx) = channel(capacity);
        let stage = self.stage.clone();
        let stage_name = format!("stage-{index}:{}", stage.name());
        let latch = latch.clone();
        let unit = async move {
            let outcome = AssertUnwindSafe(stage.run(guarded, tx.duplicate()))
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                latch.trip_aborted();
                drop(tx);
                warn!(stage = %stage.name(), "stage panicked, output cut short");
                std::panic::resume_unwind(payload);
            }
            drop(tx);
            debug!(stage = %stage.name(), "stage stopped");
        };
        units.spawn(stage_name, unit.instrument(span.clone()));
        rx
    }
}

impl<T> std::fmt::Debug for Guarded<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guarded")
            .field("stage", &self.stage.name())
            .field("cancel", &self.cancel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_relay_forwards_until_exhausted() {
        let (tx, rx) = channel(8);
        let exit = relay(
            ValueStream::from_values(vec![1, 2, 3]),
            tx,
            CancellationSignal::new(),
        )
        .await;

        assert_eq!(exit, RelayExit::Exhausted);
        assert_eq!(rx.collect_values().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_relay_stops_before_reading_when_already_cancelled() {
        let cancel = CancellationSignal::new();
        cancel.fire();

        let (tx, rx) = channel(8);
        let exit = relay(ValueStream::from_values(vec![1, 2, 3]), tx, cancel).await;

        assert_eq!(exit, RelayExit::Cancelled);
        assert_eq!(rx.collect_values().await, Vec::<i32>::new());
    }

    #[tokio::test]
    async fn test_relay_unblocks_stalled_write_on_cancel() {
        let cancel = CancellationSignal::new();
        // Capacity 1 and nobody reading: the second send can never complete.
        let (tx, rx) = channel(1);
        let input = ValueStream::from_values(vec![1, 2, 3]);

        let handle = tokio::spawn(relay(input, tx, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.fire();

        let exit = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay should stop on cancel")
            .unwrap();
        assert_eq!(exit, RelayExit::Cancelled);
        assert_eq!(rx.collect_values().await, vec![1]);
    }

    #[tokio::test]
    async fn test_relay_stops_when_downstream_gone() {
        let (tx, rx) = channel(1);
        drop(rx);

        let exit = relay(
            ValueStream::from_values(vec![1, 2]),
            tx,
            CancellationSignal::new(),
        )
        .await;
        assert_eq!(exit, RelayExit::DownstreamClosed);
    }

    #[tokio::test]
    async fn test_panicking_stage_latches_aborted_before_close() {
        let stage: Arc<dyn Stage<i32>> = Arc::new(crate::pipeline::MapStage::new(
            "picky",
            |v: i32| {
                assert!(v < 2, "value too large");
                v
            },
        ));
        let latch = Arc::new(ExitLatch::default());
        let units = UnitGroup::new();

        let mut out = Guarded::new(stage, CancellationSignal::new()).spawn(
            0,
            ValueStream::from_values(vec![1, 2, 3]),
            1,
            &latch,
            &units,
            &Span::none(),
        );

        assert_eq!(out.recv().await, Some(1));
        assert_eq!(out.recv().await, None);
        assert!(latch.is_aborted());
        assert!(!latch.is_cancelled());

        let report = units.join(Duration::from_secs(1)).await;
        assert_eq!(report.panicked, vec!["stage-0:picky".to_string()]);
        assert_eq!(report.finished, vec!["relay-0".to_string()]);
    }

    #[tokio::test]
    async fn test_spawned_relay_trips_latch_on_cancel() {
        let cancel = CancellationSignal::new();
        let latch = Arc::new(ExitLatch::default());
        let units = UnitGroup::new();
        let (_source_tx, source) = channel::<u8>(1);

        let mut out = spawn_relay(
            "relay-test".to_string(),
            source,
            1,
            cancel.clone(),
            latch.clone(),
            &units,
            &Span::none(),
        );
        cancel.fire();

        assert_eq!(out.recv().await, None);
        assert!(latch.is_cancelled());
        assert!(!latch.is_aborted());
        assert!(units.join(Duration::from_secs(1)).await.is_clean());
    }
}
