//! Apply command trigger
//!
//! Resumes a pipeline from the snapshot carried by the "Run Apply" action. The
//! whole terraform step list runs again (fresh checkout, init, validate, plan)
//! with apply explicitly requested.

use crate::core::{
    ExecutionContext, LogLevel, PipelineError, PipelineResult, ResumableSnapshot, Services,
    TriggerKind,
};
use crate::execution::StepListener;
use crate::handlers::{run_pipeline, HandlerHooks};
use crate::persistence::RunLog;
use crate::terraform::{terraform_steps, SetParameters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Parameters of an invoked "Run Apply" action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCommand {
    /// JSON encoded [`ResumableSnapshot`]
    pub snapshot: String,

    /// Id of the progress message of the run that produced the plan
    pub message_id: String,

    #[serde(default)]
    pub commit_url: Option<String>,

    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub author: Option<String>,
}

impl ApplyCommand {
    /// Read the command from chat action parameters
    pub fn from_parameters(parameters: &BTreeMap<String, String>) -> Result<Self, PipelineError> {
        let required = |key: &str| {
            parameters
                .get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| PipelineError::config(format!("Apply command is missing `{}`", key)))
        };

        Ok(Self {
            snapshot: required("snapshot")?,
            message_id: required("message_id")?,
            commit_url: parameters.get("commit_url").cloned(),
            channels: parameters
                .get("channels")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            author: parameters.get("author").cloned(),
        })
    }
}

/// Runs the terraform pipeline for apply commands
pub struct CommandHandler {
    services: Services,
    hooks: HandlerHooks,
    log_level: LogLevel,
    git_token: Option<String>,
}

impl CommandHandler {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            hooks: HandlerHooks::default(),
            log_level: LogLevel::default(),
            git_token: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn StepListener>) -> Self {
        self.hooks.listeners.push(listener);
        self
    }

    pub fn with_run_log(mut self, run_log: Arc<dyn RunLog>) -> Self {
        self.hooks.run_log = Some(run_log);
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_git_token(mut self, token: Option<String>) -> Self {
        self.git_token = token;
        self
    }

    /// Handle an apply command
    ///
    /// A snapshot that does not parse is an error before any step runs.
    pub async fn handle(&self, command: ApplyCommand) -> Result<PipelineResult, PipelineError> {
        let snapshot = ResumableSnapshot::from_json(&command.snapshot)?;
        info!(
            "Apply requested for {} at {}",
            snapshot.repo.slug(),
            snapshot.repo.short_sha()
        );

        let context = ExecutionContext::new(TriggerKind::Apply, snapshot.repo.clone(), self.services.clone())
            .with_message_id(command.message_id)
            .with_commit_url(command.commit_url)
            .with_author(command.author)
            .with_linked_channels(command.channels)
            .with_log_level(self.log_level)
            .with_git_token(self.git_token.clone());

        let steps = terraform_steps(SetParameters::from_snapshot(snapshot));
        Ok(run_pipeline(steps, &context, &self.hooks).await)
    }
}
