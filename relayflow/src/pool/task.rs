//! Units of work consumed by the worker pool.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

/// Boxed future produced by a task.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type TaskFn = Box<dyn FnOnce() -> TaskFuture + Send>;

/// A run-once unit of work yielding success or failure.
///
/// Tasks are opaque to the pool: it only observes whether they returned
/// `Ok`. A task that panics is treated as a failure.
pub struct Task {
    name: Option<String>,
    run: TaskFn,
}

impl Task {
    /// Creates a task from an async closure.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: None,
            run: Box::new(move || Box::pin(func())),
        }
    }

    /// Creates a task from a synchronous closure.
    ///
    /// The closure runs on tokio's blocking thread pool so it cannot stall
    /// the workers sharing the async runtime.
    pub fn blocking<F>(func: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::new(move || async move {
            match tokio::task::spawn_blocking(func).await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => {
                    Err(panic_error(join_error.into_panic()))
                }
                Err(join_error) => Err(anyhow::anyhow!("blocking task aborted: {join_error}")),
            }
        })
    }

    /// Attaches a label used in log events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the task label, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Runs the task to completion, converting panics into errors.
    pub(crate) async fn execute(self) -> anyhow::Result<()> {
        let run = self.run;
        let future = match std::panic::catch_unwind(AssertUnwindSafe(run)) {
            Ok(future) => future,
            Err(payload) => return Err(panic_error(payload)),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(panic_error(payload)),
        }
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    anyhow::anyhow!("task panicked: {message}")
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}
