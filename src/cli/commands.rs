//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Where the repository comes from and how to reach the cloud
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Existing checkout to run in
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Clone the repository at the commit instead of using --path
    #[arg(long)]
    pub clone: bool,

    /// File holding the cloud credential (defaults to $GOOGLE_CREDENTIALS)
    #[arg(long)]
    pub credentials_file: Option<PathBuf>,

    /// Chat channel linked to the repository (repeatable)
    #[arg(long = "channel")]
    pub channels: Vec<String>,

    /// Commit author login, notified when no channel is linked
    #[arg(long)]
    pub author: Option<String>,
}

/// Run the terraform pipeline as if a push arrived
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the pipeline YAML file
    #[arg(short, long, default_value = "tf-pipeline.yml")]
    pub config: PathBuf,

    /// Repository owner
    #[arg(long)]
    pub owner: String,

    /// Repository name
    #[arg(long)]
    pub repo: String,

    /// Commit sha (detected from the checkout when omitted)
    #[arg(long)]
    pub sha: Option<String>,

    /// Pushed branch (detected from the checkout when omitted)
    #[arg(long)]
    pub branch: Option<String>,

    #[arg(long)]
    pub commit_url: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Resume a planned run and apply it
#[derive(Debug, Args, Clone)]
pub struct ApplyCommandArgs {
    /// Snapshot JSON from the "Run Apply" action
    #[arg(long, conflicts_with = "snapshot_file", required_unless_present = "snapshot_file")]
    pub snapshot: Option<String>,

    /// File holding the snapshot JSON
    #[arg(long)]
    pub snapshot_file: Option<PathBuf>,

    /// Progress message to keep updating
    #[arg(long)]
    pub message_id: String,

    #[arg(long)]
    pub commit_url: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the pipeline YAML file
    #[arg(short, long, default_value = "tf-pipeline.yml")]
    pub config: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Repository (`owner/repo`) to filter by
    #[arg(short, long)]
    pub repo: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single run, including its transcript
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
