//! Pipeline execution.

use super::builder::PipelineBuilder;
use super::execution::Execution;
use super::relay::{spawn_relay, ExitLatch, Guarded};
use super::stage::Stage;
use super::stream::ValueStream;
use crate::cancellation::{CancellationSignal, UnitGroup};
use crate::config::PipelineConfig;
use std::sync::Arc;
use tracing::{info, info_span};
use uuid::Uuid;

/// An ordered chain of stages with cancellation enforced between them.
pub struct Pipeline<T>
where
    T: Send + 'static,
{
    name: String,
    stages: Vec<Arc<dyn Stage<T>>>,
    config: PipelineConfig,
}

impl<T> Pipeline<T>
where
    T: Send + 'static,
{
    /// Creates a pipeline from stages in execution order.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn Stage<T>>>) -> Self {
        Self {
            name: "pipeline".to_string(),
            stages,
            config: PipelineConfig::default(),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        stages: Vec<Arc<dyn Stage<T>>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            name,
            stages,
            config,
        }
    }

    /// Starts building a named pipeline.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder<T> {
        PipelineBuilder::new(name)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Returns the number of declared stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no declared stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Starts the pipeline over `input` and returns immediately.
    ///
    /// Every declared stage runs behind its own relay, and a final relay
    /// guards the output, so the output closes promptly once `cancel` fires
    /// even if no stage watches the signal. With no stages the output is
    /// the input passed through that final relay.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn execute(&self, input: ValueStream<T>, cancel: CancellationSignal) -> Execution<T> {
        let run_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "pipeline",
            run_id = %run_id,
            pipeline = %self.name,
            stages = self.stages.len()
        );
        let capacity = self.config.channel_capacity;
        let latch = Arc::new(ExitLatch::default());
        let units = UnitGroup::new();

        span.in_scope(|| info!("starting pipeline"));

        let mut stream = input;
        for (index, stage) in self.stages.iter().enumerate() {
            let guarded = Guarded::new(stage.clone(), cancel.clone());
            stream = guarded.spawn(index, stream, capacity, &latch, &units, &span);
        }
        let output = spawn_relay(
            "relay-out".to_string(),
            stream,
            capacity,
            cancel,
            latch.clone(),
            &units,
            &span,
        );

        Execution::new(run_id, output, units, latch, self.config.join_timeout())
    }
}

impl<T> std::fmt::Debug for Pipeline<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("config", &self.config)
            .finish()
    }
}

/// Runs `input` through `stages` in order and returns the output stream.
///
/// Shorthand for [`Pipeline::new`] followed by [`Pipeline::execute`], for
/// callers that only want the stream.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn execute<T>(
    input: ValueStream<T>,
    cancel: CancellationSignal,
    stages: Vec<Arc<dyn Stage<T>>>,
) -> ValueStream<T>
where
    T: Send + 'static,
{
    Pipeline::new(stages).execute(input, cancel).into_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::{IdentityStage, MapStage};
    use crate::pipeline::Termination;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_identity_pass_through() {
        let pipeline = Pipeline::new(vec![Arc::new(IdentityStage) as Arc<dyn Stage<i32>>]);
        let mut execution =
            pipeline.execute(ValueStream::from_values(1..=5), CancellationSignal::new());

        assert_eq!(execution.collect().await, vec![1, 2, 3, 4, 5]);
        assert_eq!(execution.termination(), Some(Termination::Exhausted));
        assert!(execution.join(Duration::from_secs(1)).await.is_clean());
    }

    #[tokio::test]
    async fn test_unit_count_is_two_per_stage_plus_output_relay() {
        let pipeline = Pipeline::new(vec![
            Arc::new(IdentityStage) as Arc<dyn Stage<i32>>,
            Arc::new(IdentityStage),
        ]);
        let execution =
            pipeline.execute(ValueStream::from_values(Vec::new()), CancellationSignal::new());
        assert_eq!(execution.unit_count(), 5);
    }

    #[tokio::test]
    async fn test_stages_apply_in_order() {
        let pipeline = Pipeline::new(vec![
            Arc::new(MapStage::new("add-one", |v: i32| v + 1)) as Arc<dyn Stage<i32>>,
            Arc::new(MapStage::new("double", |v: i32| v * 2)),
        ]);
        let mut execution =
            pipeline.execute(ValueStream::from_values(vec![1, 2, 3]), CancellationSignal::new());

        assert_eq!(execution.collect().await, vec![4, 6, 8]);
    }

    #[tokio::test]
    async fn test_no_stages_passes_input_through() {
        let output = execute(
            ValueStream::from_values(vec!["a", "b"]),
            CancellationSignal::new(),
            Vec::new(),
        );
        assert_eq!(output.collect_values().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_termination_unknown_while_open() {
        let (_tx, input) = crate::pipeline::channel::<i32>(1);
        let execution = Pipeline::new(Vec::new()).execute(input, CancellationSignal::new());
        assert_eq!(execution.termination(), None);
    }
}
