//! Clones repositories with the `git` binary

use crate::core::{PipelineError, RepoIdentity};
use crate::process::{ProcessCommand, ProcessRunner};
use crate::project::{Project, RepositoryLoader};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Clones `owner/repo` from a git host and checks out the requested commit
pub struct GitCloneLoader {
    runner: Arc<dyn ProcessRunner>,

    /// e.g. `https://github.com`
    host: String,

    /// Parent directory for clones
    clone_root: PathBuf,
}

impl GitCloneLoader {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            host: "https://github.com".to_string(),
            clone_root: std::env::temp_dir(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_clone_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.clone_root = root.into();
        self
    }

    /// Clone URL, with the token embedded when given
    fn clone_url(&self, repo: &RepoIdentity, credential: Option<&str>) -> String {
        match (credential, self.host.split_once("://")) {
            (Some(token), Some((scheme, rest))) => format!(
                "{}://x-access-token:{}@{}/{}/{}.git",
                scheme, token, rest, repo.owner, repo.repo
            ),
            _ => format!("{}/{}/{}.git", self.host, repo.owner, repo.repo),
        }
    }

    async fn git(&self, args: Vec<String>, dir: Option<&PathBuf>) -> Result<String, PipelineError> {
        let mut command = ProcessCommand::new("git", args);
        // The clone URL may embed a token
        command.log_command = false;
        if let Some(dir) = dir {
            command = command.current_dir(dir);
        }
        let output = self.runner.run(command).await?;
        if !output.success() {
            return Err(PipelineError::Repository(output.error_text()));
        }
        Ok(output.stdout.trim().to_string())
    }
}

#[async_trait]
impl RepositoryLoader for GitCloneLoader {
    async fn load(
        &self,
        repo: &RepoIdentity,
        credential: Option<&str>,
    ) -> Result<Project, PipelineError> {
        // Removed on drop, so a failed clone or checkout leaves nothing behind
        let scratch = tempfile::Builder::new()
            .prefix(&format!("tf-pipeline-{}-{}-", repo.owner, repo.repo))
            .tempdir_in(&self.clone_root)?;
        let target = scratch.path().to_path_buf();
        info!("Cloning {} at {} into {}", repo.slug(), repo.short_sha(), target.display());

        self.git(
            vec![
                "clone".to_string(),
                "--quiet".to_string(),
                self.clone_url(repo, credential),
                target.to_string_lossy().into_owned(),
            ],
            None,
        )
        .await?;

        if !repo.sha.is_empty() {
            self.git(
                vec!["checkout".to_string(), "--quiet".to_string(), repo.sha.clone()],
                Some(&target),
            )
            .await?;
        }

        let head = self
            .git(vec!["rev-parse".to_string(), "HEAD".to_string()], Some(&target))
            .await?;
        debug!("Checked out {} at {}", repo.slug(), head);

        let mut identity = repo.clone();
        identity.sha = head;
        Ok(Project::scratch(scratch).with_identity(identity))
    }
}
