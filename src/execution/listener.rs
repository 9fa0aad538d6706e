//! Step lifecycle observers

use crate::core::{ExecutionContext, PipelineError, Registration, StepResult};
use async_trait::async_trait;

/// Observer notified at every step transition
///
/// Callbacks run sequentially between steps. An error returned by a listener
/// is logged by the engine and never stops the pipeline.
#[async_trait]
pub trait StepListener: Send + Sync {
    /// The step's predicate passed and its action is about to run
    async fn starting(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError>;

    /// The step's predicate returned false
    async fn skipped(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError>;

    /// The step's action returned a result
    async fn completed(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
        result: &StepResult,
    ) -> Result<(), PipelineError>;

    /// The step's action raised a fault
    async fn failed(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
        error: &PipelineError,
    ) -> Result<(), PipelineError>;
}

/// A single step transition, as delivered to listeners
#[derive(Debug, Clone, Copy)]
pub enum StepEvent<'a> {
    Starting,
    Skipped,
    Completed(&'a StepResult),
    Failed(&'a PipelineError),
}

impl StepEvent<'_> {
    /// Deliver this event to one listener
    pub async fn deliver(
        self,
        listener: &dyn StepListener,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError> {
        match self {
            StepEvent::Starting => listener.starting(context, registration, step).await,
            StepEvent::Skipped => listener.skipped(context, registration, step).await,
            StepEvent::Completed(result) => {
                listener.completed(context, registration, step, result).await
            }
            StepEvent::Failed(error) => listener.failed(context, registration, step, error).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepEvent::Starting => "starting",
            StepEvent::Skipped => "skipped",
            StepEvent::Completed(_) => "completed",
            StepEvent::Failed(_) => "failed",
        }
    }
}
