//! Chat notification
//!
//! The crate only produces message content and recipients; delivering them
//! is up to a [`ChatNotifier`] implementation.

pub mod renderer;

use crate::core::{ExecutionContext, PipelineError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub use renderer::ProgressRenderer;

/// Maximum lines of command output kept in a single message block
pub const MAX_BLOCK_LINES: usize = 60;

/// Who receives a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipients {
    Channels(Vec<String>),
    Users(Vec<String>),
}

/// A button on a message that invokes a command with parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAction {
    pub label: String,
    pub command: String,
    pub parameters: BTreeMap<String, String>,
}

/// A rendered chat message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub title: String,
    pub text: String,
    /// Hex colour of the message attachment
    pub color: String,
    pub footer: Option<String>,
    pub actions: Vec<ChatAction>,
}

/// State badge shown on the progress message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    InProcess,
    Skipped,
    Failure,
    Success,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::InProcess => "in_process",
            Badge::Skipped => "skipped",
            Badge::Failure => "failure",
            Badge::Success => "success",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Badge::InProcess => "#2A7EC8",
            Badge::Skipped => "#D7B958",
            Badge::Failure => "#BC3D33",
            Badge::Success => "#45B254",
        }
    }
}

/// Trait for delivering chat messages
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Send or update the message identified by `id`
    async fn send(
        &self,
        message: &ChatMessage,
        recipients: &Recipients,
        id: &str,
    ) -> Result<(), PipelineError>;
}

/// Trait for looking up chat identities
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    /// Chat user id for a commit author login
    async fn chat_user_for(&self, author: &str) -> Option<String>;
}

/// Directory backed by a fixed author -> chat user map
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl ChatDirectory for StaticDirectory {
    async fn chat_user_for(&self, author: &str) -> Option<String> {
        self.users.get(author).cloned()
    }
}

/// Writes messages to the log instead of a chat service
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl ChatNotifier for LogNotifier {
    async fn send(
        &self,
        message: &ChatMessage,
        recipients: &Recipients,
        id: &str,
    ) -> Result<(), PipelineError> {
        info!(message_id = id, ?recipients, "{}\n{}", message.title, message.text);
        Ok(())
    }
}

/// Pick who to notify for a run
///
/// Channels linked to the repository win; otherwise the commit author's chat
/// user; otherwise nobody.
pub async fn resolve_recipients(context: &ExecutionContext) -> Option<Recipients> {
    if !context.linked_channels.is_empty() {
        return Some(Recipients::Channels(context.linked_channels.clone()));
    }
    let author = context.author.as_deref()?;
    context
        .services
        .directory
        .chat_user_for(author)
        .await
        .map(|user| Recipients::Users(vec![user]))
}

/// Format command output as a code block, keeping the tail when long
pub fn format_block(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();

    let body = if lines.len() <= max_lines {
        lines.join("\n")
    } else {
        format!(
            "... ({} earlier lines omitted)\n{}",
            lines.len() - max_lines,
            lines[lines.len() - max_lines..].join("\n")
        )
    };
    format!("```\n{}\n```", body)
}
