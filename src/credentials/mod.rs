//! Cloud credential resolution
//!
//! The resolved secret is injected into the registration's environment and
//! lives only as long as the run.

use crate::core::{PipelineError, RepoIdentity};
use async_trait::async_trait;
use std::path::PathBuf;

/// Trait for resolving the cloud credential of a repository
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, repo: &RepoIdentity) -> Result<String, PipelineError>;
}

/// Reads the credential from an environment variable of this process
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn resolve(&self, _repo: &RepoIdentity) -> Result<String, PipelineError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(PipelineError::Credential(format!(
                "Environment variable {} is not set",
                self.var
            ))),
        }
    }
}

/// Reads the credential from a file, e.g. a service account key
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn resolve(&self, _repo: &RepoIdentity) -> Result<String, PipelineError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PipelineError::Credential(format!("Cannot read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Err(PipelineError::Credential(format!(
                "Credential file {} is empty",
                self.path.display()
            )));
        }
        Ok(content.trim_end().to_string())
    }
}
