//! Terraform pipeline configuration from YAML

use crate::core::registration::{CliArg, CliVar};
use crate::core::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use anyhow::Result;

/// Log level for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, LogLevel::Debug)
    }
}

/// Top-level configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerraformConfig {
    /// Terraform workspace to select
    #[serde(default)]
    pub workspace: Option<String>,

    /// Directory holding the terraform files, relative to the repository root
    #[serde(default)]
    pub base: Option<String>,

    /// Skip `terraform init`
    #[serde(default)]
    pub disable_init: bool,

    /// Apply without waiting for the "Run Apply" action
    #[serde(default)]
    pub auto_approve: bool,

    /// Terraform version to activate with tfenv
    #[serde(default)]
    pub version: Option<String>,

    /// `KEY=value` environment variables for terraform
    #[serde(default)]
    pub env_vars: Vec<String>,

    /// `name=value` terraform variables
    #[serde(default)]
    pub cli_vars: Vec<String>,

    /// `flag` or `flag=value` extra terraform arguments
    #[serde(default)]
    pub cli_args: Vec<String>,

    /// Paths of `.tfvars` files, relative to the base directory
    #[serde(default)]
    pub var_files: Vec<String>,

    /// Only run for pushes to this branch
    #[serde(default)]
    pub restrict_branch: Option<String>,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Commit author login -> chat user id
    #[serde(default)]
    pub chat_users: HashMap<String, String>,
}

impl TerraformConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TerraformConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.parsed_env_vars()?;
        self.parsed_cli_vars()?;
        self.parsed_cli_args()?;

        if let Some(base) = &self.base {
            if Path::new(base).is_absolute() {
                anyhow::bail!("Base path must be relative to the repository root: {}", base);
            }
        }

        if matches!(&self.workspace, Some(w) if w.trim().is_empty()) {
            anyhow::bail!("Workspace name must not be empty");
        }

        Ok(())
    }

    /// Environment variables as a map
    pub fn parsed_env_vars(&self) -> Result<HashMap<String, String>, PipelineError> {
        self.env_vars
            .iter()
            .map(|entry| parse_key_value(entry, "env var"))
            .collect()
    }

    pub fn parsed_cli_vars(&self) -> Result<Vec<CliVar>, PipelineError> {
        self.cli_vars
            .iter()
            .map(|entry| parse_key_value(entry, "cli var").map(|(name, value)| CliVar::new(name, value)))
            .collect()
    }

    pub fn parsed_cli_args(&self) -> Result<Vec<CliArg>, PipelineError> {
        self.cli_args.iter().map(|entry| parse_cli_arg(entry)).collect()
    }
}

/// Parse a `key=value` entry containing exactly one `=`
pub fn parse_key_value(entry: &str, kind: &str) -> Result<(String, String), PipelineError> {
    let parts: Vec<&str> = entry.split('=').collect();
    if parts.len() != 2 || parts[0].trim().is_empty() {
        return Err(PipelineError::config(format!(
            "Invalid {} '{}': expected exactly one '=' as in key=value",
            kind, entry
        )));
    }
    Ok((parts[0].trim().to_string(), parts[1].to_string()))
}

/// Parse a `flag` or `flag=value` argument entry
pub fn parse_cli_arg(entry: &str) -> Result<CliArg, PipelineError> {
    let trimmed = entry.trim().trim_start_matches('-');
    if !trimmed.contains('=') {
        if trimmed.is_empty() {
            return Err(PipelineError::config(format!("Invalid cli arg '{}': empty flag", entry)));
        }
        return Ok(CliArg::flag(trimmed));
    }
    let (flag, value) = parse_key_value(trimmed, "cli arg")?;
    Ok(CliArg::with_value(flag, value))
}
