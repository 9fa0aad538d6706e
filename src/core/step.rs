//! Step domain model

use crate::core::{ExecutionContext, PipelineError, Registration};
use async_trait::async_trait;

/// A named, predicate-gated unit of pipeline work
///
/// Steps hold no per-run state; everything a run produces goes into the
/// [`Registration`] passed to [`Step::run`].
#[async_trait]
pub trait Step: Send + Sync {
    /// Display name, unique within a pipeline
    fn name(&self) -> &str;

    /// Whether the step should run at all; defaults to always
    fn run_when(&self, _context: &ExecutionContext, _registration: &Registration) -> bool {
        true
    }

    /// Execute the step
    ///
    /// Returning `Err` is a fault: the engine stops the pipeline without
    /// classifying the failure.
    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError>;
}

/// Whether a completed result shows up in the progress transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Classified outcome of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step succeeded; `output` is rendered transcript (plan/apply output)
    Ok { output: Option<String> },
    /// Step failed with a nonzero code
    Failed { code: i32, reason: String },
    /// Step decided at runtime there was nothing to do
    Skipped { reason: String },
}

/// Result of running a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub outcome: StepOutcome,
    pub visibility: Visibility,
}

impl StepResult {
    pub fn ok() -> Self {
        Self {
            outcome: StepOutcome::Ok { output: None },
            visibility: Visibility::Visible,
        }
    }

    pub fn ok_with_output(output: impl Into<String>) -> Self {
        Self {
            outcome: StepOutcome::Ok {
                output: Some(output.into()),
            },
            visibility: Visibility::Visible,
        }
    }

    pub fn failed(code: i32, reason: impl Into<String>) -> Self {
        debug_assert!(code != 0, "failed results carry a nonzero code");
        Self {
            outcome: StepOutcome::Failed {
                code,
                reason: reason.into(),
            },
            visibility: Visibility::Visible,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: StepOutcome::Skipped {
                reason: reason.into(),
            },
            visibility: Visibility::Visible,
        }
    }

    /// Mark the result as not shown in the transcript
    pub fn hidden(mut self) -> Self {
        self.visibility = Visibility::Hidden;
        self
    }

    /// Status code: 0 for success and skips
    pub fn code(&self) -> i32 {
        match &self.outcome {
            StepOutcome::Failed { code, .. } => *code,
            StepOutcome::Ok { .. } | StepOutcome::Skipped { .. } => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.code() != 0
    }

    /// Human readable reason or output, if any
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Ok { output } => output.as_deref(),
            StepOutcome::Failed { reason, .. } | StepOutcome::Skipped { reason } => Some(reason),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility == Visibility::Hidden
    }
}
