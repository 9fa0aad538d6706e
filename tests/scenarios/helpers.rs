//! Test utilities for tf-pipeline scenarios

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tf_pipeline::core::{PipelineError, RepoIdentity, Services};
use tf_pipeline::credentials::CredentialProvider;
use tf_pipeline::notify::{ChatMessage, ChatNotifier, Recipients, StaticDirectory};
use tf_pipeline::process::{ProcessCommand, ProcessError, ProcessOutput, ProcessRunner};
use tf_pipeline::project::LocalProjectLoader;
use tokio::sync::Mutex;

pub const BACKEND_TF: &str = r#"
terraform {
  required_version = ">= 0.12"

  backend "gcs" {
    bucket = "acme-tf-state"
    prefix = "infra"
  }
}
"#;

/// Mock runner answering by command-line prefix
///
/// Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct MockRunner {
    rules: Mutex<Vec<(String, ProcessOutput)>>,
    calls: Mutex<Vec<ProcessCommand>>,
}

impl MockRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn respond(&self, prefix: &str, status: i32, stdout: &str) {
        self.rules.lock().await.push((
            prefix.to_string(),
            ProcessOutput {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
    }

    pub async fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().await.clone()
    }

    /// Calls rendered as `program arg arg`
    pub async fn command_lines(&self) -> Vec<String> {
        self.calls().await.iter().map(|c| c.display()).collect()
    }

    /// Calls of `program` only
    pub async fn calls_to(&self, program: &str) -> Vec<ProcessCommand> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let line = command.display();
        self.calls.lock().await.push(command);
        Ok(self
            .rules
            .lock()
            .await
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

/// Notifier keeping every sent message
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ChatMessage, Recipients, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn sent(&self) -> Vec<(ChatMessage, Recipients, String)> {
        self.sent.lock().await.clone()
    }

    /// Messages sent under `id`, oldest first
    pub async fn sent_to(&self, id: &str) -> Vec<ChatMessage> {
        self.sent()
            .await
            .into_iter()
            .filter(|(_, _, sent_id)| sent_id == id)
            .map(|(message, _, _)| message)
            .collect()
    }
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn send(
        &self,
        message: &ChatMessage,
        recipients: &Recipients,
        id: &str,
    ) -> Result<(), PipelineError> {
        self.sent
            .lock()
            .await
            .push((message.clone(), recipients.clone(), id.to_string()));
        Ok(())
    }
}

/// Notifier whose chat API always answers with an error
pub struct DownNotifier;

#[async_trait]
impl ChatNotifier for DownNotifier {
    async fn send(
        &self,
        _message: &ChatMessage,
        _recipients: &Recipients,
        _id: &str,
    ) -> Result<(), PipelineError> {
        Err(PipelineError::Notification("chat API 500".to_string()))
    }
}

pub struct FixedCredential;

#[async_trait]
impl CredentialProvider for FixedCredential {
    async fn resolve(&self, _repo: &RepoIdentity) -> Result<String, PipelineError> {
        Ok("{\"type\":\"service_account\",\"project_id\":\"acme\"}".to_string())
    }
}

/// Scratch checkout with a backend-declaring `main.tf`
pub fn project_with_backend() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.tf"), BACKEND_TF).unwrap();
    dir
}

pub fn repo(branch: &str) -> RepoIdentity {
    RepoIdentity::new("acme", "infra", "3f2c1a9b8e7d6c5b", branch)
}

pub fn services(
    runner: Arc<MockRunner>,
    notifier: Arc<RecordingNotifier>,
    project: &Path,
) -> Services {
    let mut users = HashMap::new();
    users.insert("octocat".to_string(), "U042".to_string());

    Services {
        runner,
        credentials: Arc::new(FixedCredential),
        repositories: Arc::new(LocalProjectLoader::new(project)),
        chat: notifier,
        directory: Arc::new(StaticDirectory::new(users)),
    }
}
