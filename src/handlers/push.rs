//! Push trigger

use crate::core::{
    ExecutionContext, PipelineResult, RepoIdentity, Services, TerraformConfig, TriggerKind,
};
use crate::execution::StepListener;
use crate::handlers::{run_pipeline, HandlerHooks};
use crate::persistence::RunLog;
use crate::terraform::{terraform_steps, SetParameters};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A git push to a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub repo: RepoIdentity,
    #[serde(default)]
    pub commit_url: Option<String>,
    /// Login of the commit author
    #[serde(default)]
    pub author: Option<String>,
    /// Chat channels linked to the repository
    #[serde(default)]
    pub linked_channels: Vec<String>,
}

/// Runs the terraform pipeline for pushes
pub struct PushHandler {
    config: TerraformConfig,
    services: Services,
    hooks: HandlerHooks,
    git_token: Option<String>,
}

impl PushHandler {
    pub fn new(config: TerraformConfig, services: Services) -> Self {
        Self {
            config,
            services,
            hooks: HandlerHooks::default(),
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

    pub fn with_git_token(mut self, token: Option<String>) -> Self {
        self.git_token = token;
        self
    }

    /// Execution context for a push
    pub fn context_for(&self, event: &PushEvent) -> ExecutionContext {
        ExecutionContext::new(TriggerKind::Push, event.repo.clone(), self.services.clone())
            .with_commit_url(event.commit_url.clone())
            .with_author(event.author.clone())
            .with_linked_channels(event.linked_channels.clone())
            .with_log_level(self.config.log_level)
            .with_git_token(self.git_token.clone())
    }

    /// Handle a push; pushes to other branches than the restricted one are skipped
    pub async fn handle(&self, event: PushEvent) -> PipelineResult {
        if let Some(branch) = &self.config.restrict_branch {
            if branch != &event.repo.branch {
                info!(
                    "Ignoring push to {} on {}: restricted to {}",
                    event.repo.slug(),
                    event.repo.branch,
                    branch
                );
                return PipelineResult::skipped(format!(
                    "Skipped: pushes to `{}` are not deployed, only `{}`",
                    event.repo.branch, branch
                ));
            }
        }

        let context = self.context_for(&event);
        let steps = terraform_steps(SetParameters::from_config(self.config.clone()));
        run_pipeline(steps, &context, &self.hooks).await
    }
}
