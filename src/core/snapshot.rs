//! Resumable snapshot of a registration
//!
//! The "Run Apply" chat action carries this as JSON so a later command can
//! resume the pipeline at the apply stage. It holds only plain configuration:
//! the loaded project and the injected credential are never part of it and
//! are re-established by the resumed run.

use crate::core::registration::{CliArg, CliVar, Registration, RepoIdentity, CREDENTIAL_ENV_VAR};
use crate::core::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumableSnapshot {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    #[serde(default)]
    pub cli_args: Vec<CliArg>,
    #[serde(default)]
    pub cli_vars: Vec<CliVar>,
    #[serde(default)]
    pub var_files: Vec<String>,
    #[serde(default)]
    pub disable_init: bool,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub version: Option<String>,
    pub repo: RepoIdentity,
}

impl ResumableSnapshot {
    /// Capture the resumable part of a registration
    pub fn capture(registration: &Registration) -> Self {
        let env_vars = registration
            .env_vars
            .iter()
            .filter(|(key, _)| key.as_str() != CREDENTIAL_ENV_VAR)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            base: registration.base.clone(),
            workspace: registration.workspace.clone(),
            env_vars,
            cli_args: registration.cli_args.clone(),
            cli_vars: registration.cli_vars.clone(),
            var_files: registration.var_files.clone(),
            disable_init: registration.disable_init,
            auto_approve: registration.auto_approve,
            version: registration.version.clone(),
            repo: registration.repo.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the snapshot into a fresh registration
    pub fn restore_into(&self, registration: &mut Registration) {
        registration.base = self.base.clone();
        registration.workspace = self.workspace.clone();
        registration.env_vars.extend(self.env_vars.clone());
        registration.cli_args.extend(self.cli_args.iter().cloned());
        registration.cli_vars.extend(self.cli_vars.iter().cloned());
        registration.var_files.extend(self.var_files.iter().cloned());
        registration.disable_init = self.disable_init;
        registration.auto_approve = self.auto_approve;
        registration.version = self.version.clone();
        registration.repo = self.repo.clone();
    }
}
