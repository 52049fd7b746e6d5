//! Testing utilities for pools and pipelines.
//!
//! This module provides:
//! - Synthetic tasks with configurable outcome and duration
//! - A probe measuring pool concurrency
//! - Slow and recording stages, and a paced stream source

mod stages;
mod tasks;

pub use stages::{paced_source, DelayStage, RecordingStage};
pub use tasks::{fail, failing_at, sleep_then, succeed, ConcurrencyProbe};
