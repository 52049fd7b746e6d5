//! Pipeline builder with validation.

use super::executor::Pipeline;
use super::stage::Stage;
use crate::config::PipelineConfig;
use crate::errors::Result;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating validated pipelines.
pub struct PipelineBuilder<T>
where
    T: Send + 'static,
{
    /// The pipeline name.
    name: String,
    /// Stages in execution order.
    stages: Vec<Arc<dyn Stage<T>>>,
    /// Channel and join settings.
    config: PipelineConfig,
}

impl<T> PipelineBuilder<T>
where
    T: Send + 'static,
{
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            config: PipelineConfig::default(),
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage<T> + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn shared_stage(mut self, stage: Arc<dyn Stage<T>>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the per-hop channel capacity.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets the deadline used by [`Execution::join_default`](super::Execution::join_default).
    #[must_use]
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_join_timeout(timeout);
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends every stage of `other` after this builder's stages.
    ///
    /// The composed pipeline keeps this builder's configuration.
    #[must_use]
    pub fn compose(mut self, other: Self) -> Self {
        self.name = format!("{}+{}", self.name, other.name);
        self.stages.extend(other.stages);
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates the configuration and builds the pipeline.
    pub fn build(self) -> Result<Pipeline<T>> {
        self.config.validate()?;
        Ok(Pipeline::from_parts(self.name, self.stages, self.config))
    }
}

impl<T> std::fmt::Debug for PipelineBuilder<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &names)
            .field("config", &self.config)
            .finish()
    }
}
