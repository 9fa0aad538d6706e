//! Fault types raised while running a pipeline
//!
//! A fault is anything that stops a step from producing a classified
//! [`StepResult`](crate::core::StepResult). The engine catches faults per step,
//! reports them to listeners and ends the run.

use crate::process::ProcessError;
use thiserror::Error;

/// Error types for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential resolution failed: {0}")]
    Credential(String),

    #[error("Repository loading failed: {0}")]
    Repository(String),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Invalid pipeline snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Missing pipeline state: {0}")]
    MissingState(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Shorthand for a configuration fault
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config(message.into())
    }
}
