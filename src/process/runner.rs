//! Tokio-backed subprocess runner

use crate::process::{ProcessCommand, ProcessError, ProcessOutput, ProcessRunner};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runs commands with `tokio::process`
///
/// stdin is closed so an interactive prompt fails instead of hanging the run.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let shown = command.display();
        if command.log_command {
            info!("Running: {}", shown);
        }
        if !command.env.is_empty() {
            // Values may hold credentials; only keys are logged
            let mut keys: Vec<&String> = command.env.keys().collect();
            keys.sort();
            debug!("Extra environment: {:?}", keys);
        }

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            process.current_dir(dir);
        }

        let output = match command.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), process.output())
                .await
                .map_err(|_| ProcessError::Timeout {
                    command: shown.clone(),
                    secs,
                })?,
            None => process.output().await,
        }
        .map_err(|source| ProcessError::Spawn {
            command: shown.clone(),
            source,
        })?;

        let result = ProcessOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if command.log_output {
            for line in result.combined().lines() {
                debug!("[{}] {}", command.program, line);
            }
        }
        if !result.success() {
            warn!("'{}' exited with code {}", shown, result.status);
        }

        Ok(result)
    }
}
