//! Repository loading
//!
//! A [`RepositoryLoader`] turns a repository identity into a [`Project`]: a
//! directory on disk checked out at the requested commit.

pub mod git;

use crate::core::{PipelineError, RepoIdentity};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub use git::GitCloneLoader;

/// Handle to a repository checked out on disk
///
/// A project backed by a scratch clone owns that directory; it is removed
/// once the last clone of the handle is dropped.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,

    /// Identity of what was actually checked out (resolved commit sha)
    pub identity: Option<RepoIdentity>,

    scratch: Option<Arc<TempDir>>,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            identity: None,
            scratch: None,
        }
    }

    /// A project living in a scratch directory it owns
    pub fn scratch(dir: TempDir) -> Self {
        Self {
            root: dir.path().to_path_buf(),
            identity: None,
            scratch: Some(Arc::new(dir)),
        }
    }

    pub fn with_identity(mut self, identity: RepoIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.identity == other.identity
    }
}

impl Eq for Project {}

/// Trait for loading repositories - allows for different implementations
#[async_trait]
pub trait RepositoryLoader: Send + Sync {
    /// Make the repository available on disk at `repo.sha`
    async fn load(
        &self,
        repo: &RepoIdentity,
        credential: Option<&str>,
    ) -> Result<Project, PipelineError>;
}

/// Uses a checkout that already exists on disk
///
/// The directory is taken as-is; it is not reset to the requested commit.
#[derive(Debug, Clone)]
pub struct LocalProjectLoader {
    path: PathBuf,
}

impl LocalProjectLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RepositoryLoader for LocalProjectLoader {
    async fn load(
        &self,
        repo: &RepoIdentity,
        _credential: Option<&str>,
    ) -> Result<Project, PipelineError> {
        if !tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
        {
            return Err(PipelineError::Repository(format!(
                "Local checkout does not exist: {}",
                self.path.display()
            )));
        }
        Ok(Project::new(self.path.clone()).with_identity(repo.clone()))
    }
}
