//! Scenario-based tests for tf-pipeline

mod helpers;

mod apply_command;
mod push_trigger;
mod run_history;
