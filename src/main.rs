use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tf_pipeline::cli::commands::{
    ApplyCommandArgs, HistoryCommand, RunCommand, SourceArgs, ValidateCommand,
};
use tf_pipeline::cli::output::*;
use tf_pipeline::cli::terminal_output::TerminalListener;
use tf_pipeline::cli::{Cli, Command};
use tf_pipeline::core::{LogLevel, RepoIdentity, Services, TerraformConfig, CREDENTIAL_ENV_VAR};
use tf_pipeline::credentials::{CredentialProvider, EnvCredentialProvider, FileCredentialProvider};
use tf_pipeline::handlers::{ApplyCommand, CommandHandler, PushEvent, PushHandler};
use tf_pipeline::notify::{ChatNotifier, LogNotifier, StaticDirectory};
use tf_pipeline::persistence::{RunLog, RunRecord};
use tf_pipeline::process::{ProcessCommand, ProcessRunner, TokioProcessRunner};
use tf_pipeline::project::{GitCloneLoader, LocalProjectLoader, RepositoryLoader};
use tf_pipeline::terraform::STEP_COUNT;
use tracing_subscriber::EnvFilter;

/// Lines of plan/apply output echoed on the terminal
const TERMINAL_OUTPUT_LINES: usize = 15;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // The run config carries the default log level
    let config = match &cli.command {
        Command::Run(cmd) => Some(
            TerraformConfig::from_file(&cmd.config)
                .with_context(|| format!("Failed to load {}", cmd.config.display()))?,
        ),
        _ => None,
    };
    let log_level = cli.effective_log_level(
        config.as_ref().map(|c| c.log_level).unwrap_or_default(),
    );
    init_logging(log_level)?;

    let code = match &cli.command {
        Command::Run(cmd) => {
            let config = config.context("Run configuration not loaded")?;
            run_pipeline(&cli, cmd, config, log_level).await?
        }
        Command::Apply(cmd) => apply_plan(&cli, cmd, log_level).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn init_logging(level: LogLevel) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tf_pipeline={}", level.as_filter())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))
}

fn build_services(
    source: &SourceArgs,
    runner: Arc<dyn ProcessRunner>,
    chat_users: HashMap<String, String>,
) -> Services {
    let credentials: Arc<dyn CredentialProvider> = match &source.credentials_file {
        Some(path) => Arc::new(FileCredentialProvider::new(path)),
        None => Arc::new(EnvCredentialProvider::new(CREDENTIAL_ENV_VAR)),
    };
    let repositories: Arc<dyn RepositoryLoader> = if source.clone {
        Arc::new(GitCloneLoader::new(runner.clone()))
    } else {
        Arc::new(LocalProjectLoader::new(&source.path))
    };

    // Piped output gets chat messages as log lines instead of framed text
    let chat: Arc<dyn ChatNotifier> = if console::Term::stdout().is_term() {
        Arc::new(ConsoleNotifier)
    } else {
        Arc::new(LogNotifier)
    };

    Services {
        runner,
        credentials,
        repositories,
        chat,
        directory: Arc::new(StaticDirectory::new(chat_users)),
    }
}

#[cfg(feature = "sqlite")]
async fn open_run_log() -> Result<Arc<dyn RunLog>> {
    Ok(Arc::new(
        tf_pipeline::persistence::SqliteRunLog::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_run_log() -> Result<Arc<dyn RunLog>> {
    Ok(Arc::new(tf_pipeline::persistence::InMemoryRunLog::new()))
}

/// Ask git in `path` for a commit property
async fn git_value(runner: &dyn ProcessRunner, path: &Path, args: &[&str]) -> Result<String> {
    let command = ProcessCommand::new("git", args.iter().copied()).current_dir(path);
    let output = runner.run(command).await?;
    if !output.success() {
        anyhow::bail!("git {} failed: {}", args.join(" "), output.error_text());
    }
    Ok(output.stdout.trim().to_string())
}

fn git_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())
}

async fn run_pipeline(
    cli: &Cli,
    cmd: &RunCommand,
    config: TerraformConfig,
    log_level: LogLevel,
) -> Result<i32> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());

    let sha = match &cmd.sha {
        Some(sha) => sha.clone(),
        None => git_value(runner.as_ref(), &cmd.source.path, &["rev-parse", "HEAD"])
            .await
            .context("Cannot detect the commit; pass --sha")?,
    };
    let branch = match &cmd.branch {
        Some(branch) => branch.clone(),
        None => git_value(runner.as_ref(), &cmd.source.path, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .context("Cannot detect the branch; pass --branch")?,
    };
    let repo = RepoIdentity::new(&cmd.owner, &cmd.repo, sha, branch);

    println!(
        "{} Running terraform for {} at {}",
        INFO,
        style(repo.slug()).bold(),
        style(repo.short_sha()).dim()
    );

    let mut config = config;
    config.log_level = log_level;
    let services = build_services(&cmd.source, runner, config.chat_users.clone());
    let mut handler = PushHandler::new(config, services)
        .with_listener(Arc::new(TerminalListener::new(STEP_COUNT, TERMINAL_OUTPUT_LINES)))
        .with_git_token(git_token());
    if !cli.no_history {
        handler = handler.with_run_log(open_run_log().await?);
    }

    let result = handler
        .handle(PushEvent {
            repo,
            commit_url: cmd.commit_url.clone(),
            author: cmd.source.author.clone(),
            linked_channels: cmd.source.channels.clone(),
        })
        .await;

    println!("\n{}", format_result(&result));
    Ok(result.code)
}

async fn apply_plan(cli: &Cli, cmd: &ApplyCommandArgs, log_level: LogLevel) -> Result<i32> {
    let snapshot = match (&cmd.snapshot, &cmd.snapshot_file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("Either --snapshot or --snapshot-file is required"),
    };

    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
    let services = build_services(&cmd.source, runner, HashMap::new());
    let mut handler = CommandHandler::new(services)
        .with_listener(Arc::new(TerminalListener::new(STEP_COUNT, TERMINAL_OUTPUT_LINES)))
        .with_log_level(log_level)
        .with_git_token(git_token());
    if !cli.no_history {
        handler = handler.with_run_log(open_run_log().await?);
    }

    let result = handler
        .handle(ApplyCommand {
            snapshot,
            message_id: cmd.message_id.clone(),
            commit_url: cmd.commit_url.clone(),
            channels: cmd.source.channels.clone(),
            author: cmd.source.author.clone(),
        })
        .await
        .context("Failed to resume the planned run")?;

    println!("\n{}", format_result(&result));
    Ok(result.code)
}

fn validate_config(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating {}...", INFO, cmd.config.display());

    match TerraformConfig::from_file(&cmd.config) {
        Ok(config) => {
            println!("{} Configuration is valid!", CHECK);
            println!(
                "  Base: {}",
                style(config.base.as_deref().unwrap_or(".")).bold()
            );
            println!(
                "  Workspace: {}",
                style(config.workspace.as_deref().unwrap_or("(default)")).cyan()
            );
            println!("  Auto-approve: {}", style(config.auto_approve).cyan());
            println!("  Variables: {}", style(config.cli_vars.len()).cyan());

            if cmd.json {
                println!("\n{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(0)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(1)
        }
    }
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let run_log = open_run_log().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match run_log.load_run(run_id).await? {
            Some(record) if cmd.json => println!("{}", serde_json::to_string_pretty(&record)?),
            Some(record) => print_run_details(&record),
            None => println!("{} Run not found", WARN),
        }
        return Ok(0);
    }

    let mut runs = match &cmd.repo {
        Some(repo) => run_log.list_runs(repo).await?,
        None => {
            let mut all = Vec::new();
            for repo in run_log.list_repos().await? {
                all.extend(run_log.list_runs(&repo).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(0);
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, runs.len());
        for record in &runs {
            println!("  {}", format_run_record(record));
        }
    }
    Ok(0)
}

fn print_run_details(record: &RunRecord) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(record.run_id).cyan());
    println!("  Repository: {}", style(&record.repo).bold());
    println!("  Commit: {} on {}", record.sha, record.branch);
    println!("  Trigger: {}", record.trigger.as_str());
    println!("  Result: code {} ({})", record.code, record.reason.lines().next().unwrap_or(""));
    println!("  Started: {}", style(record.started_at.to_rfc3339()).dim());
    if let Ok(duration) = record.duration().to_std() {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    println!("\n{}\n{}", rule(), record.transcript);
}
