//! Pipeline execution engine

pub mod engine;
pub mod listener;

pub use engine::ExecutionEngine;
pub use listener::{StepEvent, StepListener};
