//! Cancellable staged pipeline.
//!
//! This module provides:
//! - ValueStream / StreamSender, the queues between units
//! - the Stage trait and stock stages
//! - relays enforcing cancellation in front of every stage
//! - Pipeline, its builder, and the Execution handle

mod builder;
mod execution;
mod executor;
mod relay;
mod stage;
mod stream;

pub use builder::PipelineBuilder;
pub use execution::{Execution, Termination};
pub use executor::{execute, Pipeline};
pub use relay::{relay, RelayExit};
pub use stage::{AsyncMapStage, FilterStage, IdentityStage, MapStage, Stage};
pub use stream::{channel, SendError, StreamSender, ValueStream};
