//! Single-writer, single-reader value streams.

use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub use tokio::sync::mpsc::error::SendError;

/// Creates a connected sender/stream pair.
///
/// `capacity` is the number of values that can wait in the queue; it is
/// raised to 1 if zero is given.
#[must_use]
pub fn channel<T>(capacity: usize) -> (StreamSender<T>, ValueStream<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (StreamSender { tx }, ValueStream { rx })
}

/// Write end of a stream.
///
/// The stream closes when the sender is dropped, so each stream has exactly
/// one closer: whoever owns this value.
#[derive(Debug)]
pub struct StreamSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> StreamSender<T> {
    /// Sends a value, waiting for room in the queue.
    ///
    /// Fails, returning the value, if the reading side has gone away.
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        self.tx.send(value).await
    }

    /// Returns true once the reading side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Waits until the reading side has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// A second handle on the same stream; the stream stays open until both
    /// are dropped.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Read end of a stream: an ordered sequence of values ended by close.
#[derive(Debug)]
pub struct ValueStream<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> ValueStream<T> {
    /// Builds an already closed stream holding every item of `iter`.
    pub fn from_values<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = iter.into_iter().collect();
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // Capacity equals the item count and the receiver is alive.
            let accepted = tx.try_send(item).is_ok();
            debug_assert!(accepted, "pre-sized stream rejected a value");
        }
        Self { rx }
    }

    /// Receives the next value, or `None` once the stream has closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Reads every remaining value until the stream closes.
    pub async fn collect_values(mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.rx.recv().await {
            values.push(value);
        }
        values
    }

    /// Stops accepting values; the writer sees its next send fail.
    ///
    /// Values already queued can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<T> futures::Stream for ValueStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_from_values_is_closed_and_ordered() {
        let stream = ValueStream::from_values(vec![1, 2, 3]);
        assert_eq!(stream.collect_values().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_stream_closes() {
        let mut stream = ValueStream::<u8>::from_values(Vec::new());
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_sender_drop_closes_stream() {
        let (tx, mut rx) = channel(4);
        tx.send("a").await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some("a"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_fails_after_reader_drops() {
        let (tx, rx) = channel(1);
        drop(rx);

        assert!(tx.is_closed());
        let err = tx.send(7).await.unwrap_err();
        assert_eq!(err.0, 7);
    }

    #[tokio::test]
    async fn test_closed_resolves_when_reader_leaves() {
        let (tx, rx) = channel::<u8>(1);
        let waiter = tokio::spawn(async move { tx.closed().await });

        drop(rx);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("closed() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_keeps_queued_values() {
        let (tx, mut rx) = channel(4);
        tx.send(1).await.unwrap();
        rx.close();

        assert!(tx.send(2).await.is_err());
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_implements_futures_stream() {
        let stream = ValueStream::from_values(1..=4);
        let doubled: Vec<_> = stream.map(|v| v * 2).collect().await;
        assert_eq!(doubled, vec![2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised() {
        let (tx, rx) = channel(0);
        tx.send(1).await.unwrap();
        drop(tx);
        assert_eq!(rx.collect_values().await, vec![1]);
    }
}
