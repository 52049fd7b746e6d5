//! One-shot broadcast cancellation signal.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// A callback type for fire notifications.
pub type FireCallback = Box<dyn FnOnce() + Send>;

struct Inner {
    /// Whether the signal has fired.
    fired: AtomicBool,
    /// The reason given to the first fire, if any.
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on fire.
    callbacks: Mutex<Vec<FireCallback>>,
    /// Broadcast channel waking every waiter.
    tx: watch::Sender<bool>,
}

/// A one-shot, idempotent, broadcastable stop event.
///
/// Clones share the same state. Once fired the signal stays fired: there is
/// no way back to the unfired state. Firing never blocks on observers, and
/// observers never block each other.
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    /// Creates a new, unfired signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                fired: AtomicBool::new(false),
                reason: RwLock::new(None),
                callbacks: Mutex::new(Vec::new()),
                tx,
            }),
        }
    }

    /// Fires the signal.
    ///
    /// Safe to call any number of times from any number of tasks; only the
    /// first call has an effect.
    pub fn fire(&self) {
        self.fire_inner(None);
    }

    /// Fires the signal with a reason.
    ///
    /// Only the first reason is kept.
    pub fn fire_with_reason(&self, reason: impl Into<String>) {
        self.fire_inner(Some(reason.into()));
    }

    fn fire_inner(&self, reason: Option<String>) {
        if self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if reason.is_some() {
            *self.inner.reason.write() = reason;
        }
        self.inner.tx.send_replace(true);
        debug!(reason = ?self.reason(), "cancellation signal fired");

        let callbacks: Vec<_> = {
            let mut lock = self.inner.callbacks.lock();
            std::mem::take(&mut *lock)
        };
        for callback in callbacks {
            run_callback(callback);
        }
    }

    /// Returns whether the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Waits until the signal fires.
    ///
    /// Resolves immediately if it already has. Dropping the future before it
    /// resolves is harmless, so it can sit in a `select!` branch.
    pub async fn fired(&self) {
        let mut rx = self.inner.tx.subscribe();
        // The sender lives as long as `inner`, so this only ever returns Ok.
        let _ = rx.wait_for(|fired| *fired).await;
    }

    /// Returns the reason given to the first fire, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    /// Registers a callback to run when the signal fires.
    ///
    /// If already fired, the callback runs immediately on the caller's
    /// thread. Panics in callbacks are logged and suppressed.
    pub fn on_fire<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = self.inner.callbacks.lock();
            if !self.is_fired() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        run_callback(Box::new(callback));
    }
}

fn run_callback(callback: FireCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("fired", &self.is_fired())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_signal_default_not_fired() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_fired());
        assert!(signal.reason().is_none());
    }

    #[test]
    fn test_fire_with_reason_first_wins() {
        let signal = CancellationSignal::new();
        signal.fire_with_reason("shutdown");
        signal.fire_with_reason("second");
        signal.fire();

        assert!(signal.is_fired());
        assert_eq!(signal.reason(), Some("shutdown".to_string()));
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancellationSignal::new();
        let observer = signal.clone();

        signal.fire();
        assert!(observer.is_fired());
    }

    #[test]
    fn test_on_fire_before_and_after() {
        let signal = CancellationSignal::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = counter.clone();
        signal.on_fire(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        signal.fire();
        signal.fire();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let counter_clone = counter.clone();
        signal.on_fire(move || {
            counter_clone.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_callback_panic_suppressed() {
        let signal = CancellationSignal::new();
        signal.on_fire(|| panic!("Intentional panic"));

        signal.fire();
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn test_fired_resolves_immediately_when_already_fired() {
        let signal = CancellationSignal::new();
        signal.fire();

        tokio::time::timeout(Duration::from_millis(100), signal.fired())
            .await
            .expect("fired() should resolve");
    }

    #[tokio::test]
    async fn test_many_waiters_wake_on_fire() {
        let signal = CancellationSignal::new();
        let mut handles = Vec::new();

        for _ in 0..8 {
            let waiter = signal.clone();
            handles.push(tokio::spawn(async move {
                waiter.fired().await;
                waiter.is_fired()
            }));
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.fire();

        for handle in handles {
            let observed = tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("waiter should wake")
                .unwrap();
            assert!(observed);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fire_is_idempotent() {
        let signal = CancellationSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        signal.on_fire(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.fire_with_reason(format!("caller-{i}")) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(signal.is_fired());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(signal.reason().unwrap().starts_with("caller-"));
    }
}
