//! Cooperative cancellation primitives.
//!
//! This module provides:
//! - CancellationSignal, a one-shot broadcast stop event
//! - UnitGroup for joining spawned units under a deadline

mod signal;
mod units;

pub use signal::{CancellationSignal, FireCallback};
pub use units::{JoinReport, UnitGroup};
