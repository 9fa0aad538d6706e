//! CLI output formatting

use crate::core::{abbreviate_sha, PipelineError, PipelineResult};
use crate::notify::{Badge, ChatMessage, ChatNotifier, Recipients};
use crate::persistence::RunRecord;
use async_trait::async_trait;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over the pipeline's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule spanning the terminal
pub fn rule() -> String {
    let width = term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80);
    "─".repeat(width.min(120))
}

/// Format a final pipeline result
pub fn format_result(result: &PipelineResult) -> String {
    if result.is_success() {
        if result.reason.starts_with("Skipped") {
            format!("{} {}", SKIP, style(&result.reason).yellow())
        } else {
            format!("{} Pipeline {}", CHECK, style("succeeded").green())
        }
    } else {
        format!(
            "{} Pipeline {} (code {})\n{}",
            CROSS,
            style("failed").red(),
            result.code,
            format_output(&result.reason, 20)
        )
    }
}

/// One line per run, for history listings
pub fn format_run_record(record: &RunRecord) -> String {
    let icon = if record.is_success() { CHECK } else { CROSS };
    let id = record.run_id.to_string();

    format!(
        "{} {} - {} {}@{} - {} - {} ({})",
        icon,
        style(&id[..8]).dim(),
        style(&record.repo).bold(),
        record.branch,
        abbreviate_sha(&record.sha),
        record.trigger.as_str(),
        if record.is_success() {
            style(format!("code {}", record.code)).green()
        } else {
            style(format!("code {}", record.code)).red()
        },
        style(record.started_at.format("%Y-%m-%d %H:%M:%S").to_string()).dim()
    )
}

pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Chat stand-in printing messages to the terminal
///
/// In-progress updates are left to the terminal listener; only settled
/// progress messages and messages with actions are printed.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    fn render(message: &ChatMessage, recipients: &Recipients) -> String {
        let to = match recipients {
            Recipients::Channels(channels) => channels.join(", "),
            Recipients::Users(users) => users.join(", "),
        };
        let mut lines = vec![
            rule(),
            format!("{} {}", style(&message.title).bold(), style(format!("→ {}", to)).dim()),
            message.text.clone(),
        ];
        if let Some(footer) = &message.footer {
            lines.push(style(footer).dim().to_string());
        }
        for action in &message.actions {
            lines.push(format!("[{}] tf-pipeline {}", style(&action.label).cyan().bold(), action.command));
            for (key, value) in &action.parameters {
                lines.push(format!("    --{} '{}'", key.replace('_', "-"), value));
            }
        }
        lines.push(rule());
        lines.join("\n")
    }
}

#[async_trait]
impl ChatNotifier for ConsoleNotifier {
    async fn send(
        &self,
        message: &ChatMessage,
        recipients: &Recipients,
        id: &str,
    ) -> Result<(), PipelineError> {
        if message.color == Badge::InProcess.color() && message.actions.is_empty() {
            tracing::debug!(message_id = id, "progress update");
            return Ok(());
        }
        println!("{}", Self::render(message, recipients));
        Ok(())
    }
}
