//! Progress renderer - keeps one chat message in sync with the pipeline
//!
//! Every lifecycle callback appends a line to the transcript and upserts the
//! progress message under the run's stable message id, so a channel sees one
//! message being edited rather than one message per step.

use crate::core::{
    ExecutionContext, PipelineError, PlanOutcome, Registration, RepoIdentity, StepOutcome,
    StepResult,
};
use crate::execution::StepListener;
use crate::notify::{format_block, resolve_recipients, Badge, ChatMessage, Recipients, MAX_BLOCK_LINES};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

/// Per-run state behind the renderer
#[derive(Debug, Default)]
struct ListenerRecord {
    transcript: Vec<String>,
    /// Output blocks (plan/apply output, failure output)
    full_render: Vec<String>,
    finished: usize,
    failed: bool,
    last_skipped: bool,
    /// The plan found changes that still wait for approval
    awaiting_approval: bool,
    /// Repository identity shown in the header, refreshed once the project loads
    repo: Option<RepoIdentity>,
    /// Resolved on first send; `Some(None)` means nobody to notify
    recipients: Option<Option<Recipients>>,
}

/// Listener rendering pipeline progress into a single chat message
pub struct ProgressRenderer {
    total_steps: usize,
    record: Mutex<ListenerRecord>,
}

impl ProgressRenderer {
    pub fn new(total_steps: usize) -> Self {
        Self {
            total_steps,
            record: Mutex::new(ListenerRecord::default()),
        }
    }

    /// Transcript accumulated so far, one line per transition
    pub async fn transcript(&self) -> String {
        self.record.lock().await.transcript.join("\n")
    }

    /// Transcript followed by the output blocks
    pub async fn full_transcript(&self) -> String {
        let record = self.record.lock().await;
        let mut parts = vec![record.transcript.join("\n")];
        parts.extend(record.full_render.iter().cloned());
        parts.join("\n\n")
    }

    pub async fn finished(&self) -> usize {
        self.record.lock().await.finished
    }

    pub async fn badge(&self) -> Badge {
        let record = self.record.lock().await;
        self.badge_for(&record)
    }

    fn badge_for(&self, record: &ListenerRecord) -> Badge {
        if record.failed {
            Badge::Failure
        } else if record.finished >= self.total_steps {
            if record.last_skipped && record.awaiting_approval {
                Badge::Skipped
            } else {
                Badge::Success
            }
        } else {
            Badge::InProcess
        }
    }

    fn refresh_repo(record: &mut ListenerRecord, context: &ExecutionContext, registration: &Registration) {
        let known = registration
            .project
            .as_ref()
            .and_then(|project| project.identity.clone())
            .or_else(|| (!registration.repo.owner.is_empty()).then(|| registration.repo.clone()));

        match known {
            Some(identity) => record.repo = Some(identity),
            None if record.repo.is_none() => record.repo = Some(context.repo.clone()),
            None => {}
        }
    }

    fn render(
        &self,
        record: &ListenerRecord,
        context: &ExecutionContext,
        registration: &Registration,
    ) -> ChatMessage {
        let repo = record.repo.as_ref().unwrap_or(&context.repo);
        let badge = self.badge_for(record);

        let commit = match &context.commit_url {
            Some(url) => format!("<{}|`{}`>", url, repo.short_sha()),
            None => format!("`{}`", repo.short_sha()),
        };
        let approval = if registration.auto_approve {
            "auto-approve is on: changes are applied without review"
        } else {
            "changes are applied only after approval"
        };

        let mut text = format!("Commit {} on `{}` ({})", commit, repo.branch, approval);
        if !record.transcript.is_empty() {
            text.push_str("\n\n");
            text.push_str(&record.transcript.join("\n"));
        }
        for block in &record.full_render {
            text.push_str("\n\n");
            text.push_str(block);
        }

        ChatMessage {
            title: format!("Terraform ▸ {}", repo.slug()),
            text,
            color: badge.color().to_string(),
            footer: Some(format!(
                "{}/{} steps · {}",
                record.finished,
                self.total_steps,
                badge.label()
            )),
            actions: Vec::new(),
        }
    }

    /// Update the record, then upsert the message unless `send` is false
    async fn transition<F>(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        send: bool,
        update: F,
    ) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut ListenerRecord) + Send,
    {
        let mut record = self.record.lock().await;
        update(&mut record);
        Self::refresh_repo(&mut record, context, registration);
        record.awaiting_approval = registration.plan == Some(PlanOutcome::ChangesPresent);

        if !send {
            return Ok(());
        }

        if record.recipients.is_none() {
            record.recipients = Some(resolve_recipients(context).await);
        }
        let recipients = match record.recipients.clone().flatten() {
            Some(recipients) => recipients,
            None => {
                debug!("No chat target for {}; progress kept in run log only", context.repo.slug());
                return Ok(());
            }
        };

        let message = self.render(&record, context, registration);
        drop(record);
        context
            .services
            .chat
            .send(&message, &recipients, &context.message_id)
            .await
    }
}

fn running_line(step: &str) -> String {
    format!("▶ Running *{}*", step)
}

fn first_line(text: &str) -> &str {
    text.lines().find(|line| !line.trim().is_empty()).unwrap_or("").trim()
}

#[async_trait]
impl StepListener for ProgressRenderer {
    async fn starting(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError> {
        let line = running_line(step);
        self.transition(context, registration, true, |record| {
            record.transcript.push(line);
        })
        .await
    }

    async fn skipped(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError> {
        let line = format!("⏭ Skipped *{}*", step);
        self.transition(context, registration, true, |record| {
            record.transcript.push(line);
            record.finished += 1;
            record.last_skipped = true;
        })
        .await
    }

    async fn completed(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
        result: &StepResult,
    ) -> Result<(), PipelineError> {
        // Failures are always shown
        let visible = !result.is_hidden() || result.is_failure();

        let running = running_line(step);
        let (line, block, failed, skipped) = match &result.outcome {
            StepOutcome::Ok { output } => (
                format!("✔ Completed *{}*", step),
                output.as_ref().map(|out| format!("*{}*\n{}", step, format_block(out, MAX_BLOCK_LINES))),
                false,
                false,
            ),
            StepOutcome::Failed { code, reason } => (
                format!("✖ Failed *{}* (code {}): {}", step, code, first_line(reason)),
                Some(format!("*{}*\n{}", step, format_block(reason, MAX_BLOCK_LINES))),
                true,
                false,
            ),
            StepOutcome::Skipped { reason } => (
                format!("⏭ Skipped *{}*: {}", step, reason),
                None,
                false,
                true,
            ),
        };

        self.transition(context, registration, visible, |record| {
            record.finished += 1;
            record.last_skipped = skipped;
            record.failed |= failed;
            if visible {
                record.transcript.push(line);
                record.full_render.extend(block);
            } else if record.transcript.last() == Some(&running) {
                // A hidden step leaves no trace in the transcript
                record.transcript.pop();
            }
        })
        .await
    }

    async fn failed(
        &self,
        context: &ExecutionContext,
        registration: &Registration,
        step: &str,
        error: &PipelineError,
    ) -> Result<(), PipelineError> {
        let line = format!("✖ Error in *{}*: {}", step, error);
        self.transition(context, registration, true, |record| {
            record.transcript.push(line);
            record.finished += 1;
            record.failed = true;
            record.last_skipped = false;
        })
        .await
    }
}
