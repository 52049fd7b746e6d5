//! Stage trait and implementations.
//!
//! A stage reads one stream and writes another. Stages do not need to know
//! about cancellation: the pipeline guards each of them with a relay.

use super::stream::{StreamSender, ValueStream};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Trait for pipeline stages.
///
/// `run` should return once `input` closes or once a send on `output`
/// fails; either means there is nothing left to do. Dropping `output` on
/// return closes the downstream stream.
#[async_trait]
pub trait Stage<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Transforms `input` into `output`.
    async fn run(&self, input: ValueStream<T>, output: StreamSender<T>);
}

/// Forwards every value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStage;

#[async_trait]
impl<T> Stage<T> for IdentityStage
where
    T: Send + 'static,
{
    fn name(&self) -> &str {
        "identity"
    }

    async fn run(&self, mut input: ValueStream<T>, output: StreamSender<T>) {
        while let Some(value) = input.recv().await {
            if output.send(value).await.is_err() {
                break;
            }
        }
    }
}

/// A 1:1 stage applying a synchronous function to each value.
pub struct MapStage<T, F> {
    name: String,
    func: F,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T, F> MapStage<T, F>
where
    F: Fn(T) -> T + Send + Sync,
{
    /// Creates a new map stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _marker: PhantomData,
        }
    }
}

impl<T, F> std::fmt::Debug for MapStage<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<T, F> Stage<T> for MapStage<T, F>
where
    T: Send + 'static,
    F: Fn(T) -> T + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, mut input: ValueStream<T>, output: StreamSender<T>) {
        while let Some(value) = input.recv().await {
            if output.send((self.func)(value)).await.is_err() {
                break;
            }
        }
    }
}

/// A 1:1 stage applying an async function to each value.
///
/// Values are processed one at a time, so output order matches input order.
pub struct AsyncMapStage<T, F, Fut> {
    name: String,
    func: F,
    _marker: PhantomData<fn(T) -> Fut>,
}

impl<T, F, Fut> AsyncMapStage<T, F, Fut>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = T> + Send,
{
    /// Creates a new async map stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _marker: PhantomData,
        }
    }
}

impl<T, F, Fut> std::fmt::Debug for AsyncMapStage<T, F, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMapStage")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<T, F, Fut> Stage<T> for AsyncMapStage<T, F, Fut>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = T> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, mut input: ValueStream<T>, output: StreamSender<T>) {
        while let Some(value) = input.recv().await {
            let mapped = (self.func)(value).await;
            if output.send(mapped).await.is_err() {
                break;
            }
        }
    }
}

/// Drops the values for which the predicate returns false.
pub struct FilterStage<T, F> {
    name: String,
    predicate: F,
    _marker: PhantomData<fn(&T) -> bool>,
}

impl<T, F> FilterStage<T, F>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    /// Creates a new filter stage.
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            _marker: PhantomData,
        }
    }
}

impl<T, F> std::fmt::Debug for FilterStage<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<T, F> Stage<T> for FilterStage<T, F>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, mut input: ValueStream<T>, output: StreamSender<T>) {
        while let Some(value) = input.recv().await {
            if !(self.predicate)(&value) {
                continue;
            }
            if output.send(value).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stream::channel;
    use pretty_assertions::assert_eq;

    async fn drive<S: Stage<i32>>(stage: &S, values: Vec<i32>) -> Vec<i32> {
        let (tx, rx) = channel(values.len().max(1));
        stage.run(ValueStream::from_values(values), tx).await;
        rx.collect_values().await
    }

    #[tokio::test]
    async fn test_identity_stage() {
        assert_eq!(drive(&IdentityStage, vec![1, 2, 3]).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_map_stage() {
        let stage = MapStage::new("double", |v: i32| v * 2);
        assert_eq!(stage.name(), "double");
        assert_eq!(drive(&stage, vec![1, 2, 3]).await, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_async_map_stage_keeps_order() {
        let stage = AsyncMapStage::new("slow-inc", |v: i32| async move {
            tokio::time::sleep(std::time::Duration::from_millis((5 - v) as u64)).await;
            v + 1
        });
        assert_eq!(drive(&stage, vec![1, 2, 3, 4]).await, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_filter_stage() {
        let stage = FilterStage::new("even", |v: &i32| v % 2 == 0);
        assert_eq!(drive(&stage, (1..=6).collect()).await, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_stage_stops_when_output_closes() {
        let (tx, rx) = channel(1);
        drop(rx);

        // Would hang forever if the stage ignored the send failure.
        let input = ValueStream::from_values(0..1000);
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            IdentityStage.run(input, tx),
        )
        .await
        .expect("stage should stop once its output is gone");
    }
}
