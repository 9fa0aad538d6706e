//! tf-pipeline - terraform step pipelines for git pushes, reported to chat

pub mod cli;
pub mod core;
pub mod credentials;
pub mod execution;
pub mod handlers;
pub mod notify;
pub mod persistence;
pub mod process;
pub mod project;
pub mod terraform;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use core::{
    ExecutionContext, PipelineError, PipelineResult, Registration, RepoIdentity,
    ResumableSnapshot, Services, Step, StepResult, TerraformConfig,
};
pub use execution::{ExecutionEngine, StepListener};
pub use handlers::{ApplyCommand, CommandHandler, PushEvent, PushHandler};
pub use notify::{ChatMessage, ChatNotifier, ProgressRenderer, Recipients};
pub use process::{ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};
