//! # Relayflow
//!
//! Two small concurrency engines for tokio applications:
//!
//! - **Bounded worker pool**: runs a fixed batch of independent tasks on a
//!   limited number of workers and stops scheduling once too many of them
//!   have failed.
//! - **Cancellable staged pipeline**: streams values through an ordered
//!   chain of stages, with a relay in front of each stage that shuts the
//!   chain down as soon as a shared cancellation signal fires.
//!
//! Both engines work on opaque closures and values and leave no spawned
//! task behind once they finish.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relayflow::prelude::*;
//!
//! // Worker pool: 5 workers, tolerate 2 failures.
//! let tasks: Vec<Task> = jobs.into_iter().map(|job| Task::new(move || job.run())).collect();
//! relayflow::pool::run(tasks, 5, 2).await?;
//!
//! // Pipeline: fire `cancel` from a shutdown hook to stop early.
//! let cancel = CancellationSignal::new();
//! let pipeline = Pipeline::builder("numbers")
//!     .stage(MapStage::new("double", |v: i64| v * 2))
//!     .build()?;
//! let mut execution = pipeline.execute(ValueStream::from_values(1..=5), cancel.clone());
//! while let Some(value) = execution.recv().await {
//!     println!("{value}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod pool;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationSignal, JoinReport, UnitGroup};
    pub use crate::config::{PipelineConfig, PoolConfig};
    pub use crate::errors::{PoolError, RelayflowError, Result};
    pub use crate::pipeline::{
        AsyncMapStage, Execution, FilterStage, IdentityStage, MapStage, Pipeline,
        PipelineBuilder, Stage, StreamSender, Termination, ValueStream,
    };
    pub use crate::pool::{RunReport, Task, WorkerPool};
}
