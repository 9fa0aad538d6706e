//! Core domain models
//!
//! This module defines the data threaded through a pipeline run: the
//! registration parameter bag, steps and their results, the execution
//! context and configuration.

pub mod config;
pub mod context;
pub mod error;
pub mod registration;
pub mod snapshot;
pub mod state;
pub mod step;

pub use config::{LogLevel, TerraformConfig};
pub use context::{ExecutionContext, Services};
pub use error::PipelineError;
pub use registration::*;
pub use snapshot::ResumableSnapshot;
pub use state::*;
pub use step::*;
