//! Registration - the parameter bag shared by every step of one run

use crate::project::Project;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable the cloud credential is injected under
pub const CREDENTIAL_ENV_VAR: &str = "GOOGLE_CREDENTIALS";

/// A user-supplied terraform CLI argument, rendered `-flag` or `-flag=value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliArg {
    pub flag: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl CliArg {
    /// An argument without a value
    pub fn flag(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: None,
        }
    }

    /// An argument with a value
    pub fn with_value(flag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: Some(value.into()),
        }
    }

    /// Render as a terraform command line token
    pub fn render(&self) -> String {
        match &self.value {
            Some(value) => format!("-{}={}", self.flag, value),
            None => format!("-{}", self.flag),
        }
    }
}

/// A terraform input variable, rendered `-var name=value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliVar {
    pub tf_var: String,
    pub value: String,
}

impl CliVar {
    pub fn new(tf_var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tf_var: tf_var.into(),
            value: value.into(),
        }
    }
}

/// Identity of the repository and commit a run operates on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub owner: String,
    pub repo: String,
    pub sha: String,
    pub branch: String,
}

impl RepoIdentity {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        sha: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            sha: sha.into(),
            branch: branch.into(),
        }
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// First seven characters of the commit sha
    pub fn short_sha(&self) -> &str {
        abbreviate_sha(&self.sha)
    }
}

/// First seven characters of `sha`, cut on a char boundary
pub fn abbreviate_sha(sha: &str) -> &str {
    let end = sha
        .char_indices()
        .nth(7)
        .map(|(idx, _)| idx)
        .unwrap_or(sha.len());
    &sha[..end]
}

/// What `terraform plan` reported through its detailed exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
    NoChanges,
    ChangesPresent,
}

/// The parameter bag threaded through every step of a pipeline run
///
/// Created empty by the engine, populated by the parameter step and then
/// only extended by later steps.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// Directory inside the project holding the terraform configuration
    pub base: Option<String>,

    /// Terraform workspace to select before planning
    pub workspace: Option<String>,

    /// Extra environment for every subprocess; wins over the process environment
    pub env_vars: HashMap<String, String>,

    pub cli_args: Vec<CliArg>,

    pub cli_vars: Vec<CliVar>,

    pub var_files: Vec<String>,

    /// When true `terraform init` is not run
    pub disable_init: bool,

    pub auto_approve: bool,

    /// Terraform version to activate through the version manager
    pub version: Option<String>,

    pub repo: RepoIdentity,

    /// Set by the load step once the repository is on disk
    pub project: Option<Project>,

    /// Apply was explicitly requested (the "Run Apply" action)
    pub apply_requested: bool,

    /// Recorded by the plan step for the apply predicate
    pub plan: Option<PlanOutcome>,
}

impl Registration {
    /// Directory terraform runs in: `<project root>/<base or "">`
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .map(|project| project.root().join(self.base.as_deref().unwrap_or("")))
    }
}
