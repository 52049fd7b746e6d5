//! Synthetic stages and sources.

use crate::pipeline::{channel, Stage, StreamSender, ValueStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Identity stage that sleeps before forwarding each value.
///
/// It never looks at any cancellation signal, which makes it a good stand-in
/// for business stages that rely on the pipeline's relays.
#[derive(Debug, Clone)]
pub struct DelayStage {
    name: String,
    delay: Duration,
}

impl DelayStage {
    /// Creates a delay stage.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl<T> Stage<T> for DelayStage
where
    T: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, mut input: ValueStream<T>, output: StreamSender<T>) {
        while let Some(value) = input.recv().await {
            tokio::time::sleep(self.delay).await;
            if output.send(value).await.is_err() {
                break;
            }
        }
    }
}

/// Identity stage that keeps a copy of every value it forwards.
#[derive(Debug)]
pub struct RecordingStage<T> {
    name: String,
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> RecordingStage<T>
where
    T: Clone,
{
    /// Creates a recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a handle to the recorded values, usable after the stage has
    /// been moved into a pipeline.
    #[must_use]
    pub fn recorder(&self) -> Arc<Mutex<Vec<T>>> {
        self.seen.clone()
    }

    /// Returns the values recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<T> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl<T> Stage<T> for RecordingStage<T>
where
    T: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, mut input: ValueStream<T>, output: StreamSender<T>) {
        while let Some(value) = input.recv().await {
            self.seen.lock().push(value.clone());
            if output.send(value).await.is_err() {
                break;
            }
        }
    }
}

/// Spawns a producer emitting `values` one per `interval`.
///
/// The producer stops early once the stream's reader goes away. The returned
/// handle resolves to the number of values actually sent.
pub fn paced_source<T, I>(values: I, interval: Duration) -> (ValueStream<T>, JoinHandle<usize>)
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let (tx, rx) = channel(1);
    let iter = values.into_iter();
    let handle = tokio::spawn(async move {
        let mut sent = 0;
        for value in iter {
            tokio::time::sleep(interval).await;
            if tx.send(value).await.is_err() {
                break;
            }
            sent += 1;
        }
        sent
    });
    (rx, handle)
}
