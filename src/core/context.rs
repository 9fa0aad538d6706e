//! Execution context - immutable per-run data and collaborators

use crate::core::config::LogLevel;
use crate::core::registration::RepoIdentity;
use crate::core::state::TriggerKind;
use crate::credentials::CredentialProvider;
use crate::notify::{ChatDirectory, ChatNotifier};
use crate::process::ProcessRunner;
use crate::project::RepositoryLoader;
use std::sync::Arc;
use uuid::Uuid;

/// External collaborators a run talks to
#[derive(Clone)]
pub struct Services {
    pub runner: Arc<dyn ProcessRunner>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub repositories: Arc<dyn RepositoryLoader>,
    pub chat: Arc<dyn ChatNotifier>,
    pub directory: Arc<dyn ChatDirectory>,
}

/// Execution context for a pipeline run
///
/// Passed by shared reference to every step and listener. Anything that would
/// otherwise be process-wide (log level, git token) lives here so runs stay
/// isolated from each other.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Unique id of this run
    pub run_id: Uuid,

    pub trigger: TriggerKind,

    /// Repository and commit as reported by the trigger
    pub repo: RepoIdentity,

    pub commit_url: Option<String>,

    /// Login of the commit author, used to find a chat user
    pub author: Option<String>,

    /// Chat channels linked to the repository
    pub linked_channels: Vec<String>,

    /// Stable id of the progress message; every update upserts it
    pub message_id: String,

    pub log_level: LogLevel,

    /// Token handed to the repository loader
    pub git_token: Option<String>,

    pub services: Services,
}

impl ExecutionContext {
    /// Create a context with a fresh run id and message id
    pub fn new(trigger: TriggerKind, repo: RepoIdentity, services: Services) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            trigger,
            repo,
            commit_url: None,
            author: None,
            linked_channels: Vec::new(),
            message_id: format!("terraform-{}", run_id),
            log_level: LogLevel::default(),
            git_token: None,
            services,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_commit_url(mut self, commit_url: Option<String>) -> Self {
        self.commit_url = commit_url;
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn with_linked_channels(mut self, channels: Vec<String>) -> Self {
        self.linked_channels = channels;
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
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id)
            .field("trigger", &self.trigger)
            .field("repo", &self.repo)
            .field("message_id", &self.message_id)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}
