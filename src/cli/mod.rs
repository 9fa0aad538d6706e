//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use crate::core::LogLevel;
use clap::{Parser, Subcommand};
use commands::{ApplyCommandArgs, HistoryCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Terraform pipelines for git pushes
#[derive(Debug, Parser, Clone)]
#[command(name = "tf-pipeline")]
#[command(version)]
#[command(about = "Runs terraform step pipelines and reports progress to chat", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the configured log level
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Don't save the run to history
    #[arg(long, global = true)]
    pub no_history: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the pipeline for a commit
    Run(RunCommand),

    /// Apply a previously planned run
    Apply(ApplyCommandArgs),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// Effective log level: --verbose, then --log-level, then the configured one
    pub fn effective_log_level(&self, configured: LogLevel) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level.unwrap_or(configured)
        }
    }
}
