//! Main execution engine - runs a step list against one registration

use crate::core::{ExecutionContext, PipelineError, PipelineResult, Registration, Step};
use crate::execution::listener::{StepEvent, StepListener};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sequential, predicate-gated step executor
///
/// Steps run strictly one after another against a single registration. The
/// first step returning a nonzero code, or raising a fault, ends the run. A
/// listener error counts as a fault of the step it was reporting.
pub struct ExecutionEngine {
    steps: Vec<Box<dyn Step>>,
    listeners: Vec<Arc<dyn StepListener>>,
}

impl ExecutionEngine {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            listeners: Vec::new(),
        }
    }

    /// Add a listener; listeners are notified in the order they were added
    pub fn add_listener(&mut self, listener: Arc<dyn StepListener>) {
        self.listeners.push(listener);
    }

    pub fn with_listener(mut self, listener: Arc<dyn StepListener>) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Execute the pipeline with a fresh registration
    pub async fn execute(&self, context: &ExecutionContext) -> PipelineResult {
        let mut registration = Registration::default();
        self.execute_with(context, &mut registration).await
    }

    /// Execute the pipeline against a caller-owned registration
    pub async fn execute_with(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> PipelineResult {
        if let Some(name) = self.duplicate_step_name() {
            error!("Duplicate step name in pipeline: {}", name);
            return PipelineResult::failure(1, format!("Duplicate step name: {}", name));
        }

        info!(
            "Starting pipeline {} for {} ({} steps)",
            context.run_id,
            context.repo.slug(),
            self.steps.len()
        );

        for step in &self.steps {
            let name = step.name();

            if !step.run_when(context, registration) {
                debug!("Skipping step: {}", name);
                if let Err(fault) = self.emit(context, registration, name, StepEvent::Skipped).await {
                    return self.abort(context, registration, name, fault).await;
                }
                continue;
            }

            info!("Running step: {}", name);
            if let Err(fault) = self.emit(context, registration, name, StepEvent::Starting).await {
                return self.abort(context, registration, name, fault).await;
            }

            let result = match step.run(context, registration).await {
                Ok(result) => result,
                Err(fault) => return self.abort(context, registration, name, fault).await,
            };

            if let Err(fault) = self
                .emit(context, registration, name, StepEvent::Completed(&result))
                .await
            {
                return self.abort(context, registration, name, fault).await;
            }
            if result.code() != 0 {
                warn!("Step {} failed with code {}", name, result.code());
                return PipelineResult::failure(
                    result.code(),
                    result.reason().unwrap_or("Step failed"),
                );
            }
        }

        info!("Pipeline {} finished successfully", context.run_id);
        PipelineResult::success()
    }

    /// End the run on a fault raised by a step or by a listener
    async fn abort(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
        fault: PipelineError,
    ) -> PipelineResult {
        error!("Step {} raised an error: {}", step, fault);
        if let Err(e) = self
            .emit(context, registration, step, StepEvent::Failed(&fault))
            .await
        {
            warn!("Listener failed while reporting {}: {}", step, e);
        }
        PipelineResult::failure(1, format!("{} failed: {}", step, fault))
    }

    /// Emit an event to every listener, returning the first listener error
    async fn emit(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
        event: StepEvent<'_>,
    ) -> Result<(), PipelineError> {
        let mut first_error = None;
        for listener in &self.listeners {
            if let Err(e) = event
                .deliver(listener.as_ref(), context, registration, step)
                .await
            {
                warn!("Listener failed on {} event for {}: {}", event.name(), step, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn duplicate_step_name(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .map(|step| step.name())
            .find(|name| !seen.insert(*name))
    }
}
