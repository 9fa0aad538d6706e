//! Shared fakes for unit tests

use crate::core::{
    ExecutionContext, PipelineError, Registration, RepoIdentity, Services, StepResult,
    TriggerKind,
};
use crate::credentials::CredentialProvider;
use crate::execution::StepListener;
use crate::notify::{ChatMessage, ChatNotifier, Recipients, StaticDirectory};
use crate::process::{ProcessCommand, ProcessError, ProcessOutput, ProcessRunner};
use crate::project::LocalProjectLoader;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) fn test_repo() -> RepoIdentity {
    RepoIdentity::new("acme", "infra", "0123456789abcdef", "main")
}

/// Scratch checkout holding a `main.tf` with a gcs backend
pub(crate) fn fixture_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("main.tf"),
        "terraform {\n  backend \"gcs\" {\n    bucket = \"state\"\n  }\n}\n",
    )
    .unwrap();
    dir
}

pub(crate) fn output(status: i32, stdout: &str) -> ProcessOutput {
    ProcessOutput {
        status,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// Runner answering by command-line prefix and keeping every call
#[derive(Default)]
pub(crate) struct MockRunner {
    rules: Mutex<Vec<(String, ProcessOutput)>>,
    calls: Mutex<Vec<ProcessCommand>>,
}

impl MockRunner {
    /// Answer commands whose display starts with `prefix`; first match wins
    pub(crate) async fn respond(&self, prefix: &str, output: ProcessOutput) {
        self.rules.lock().await.push((prefix.to_string(), output));
    }

    pub(crate) async fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().await.clone()
    }

    /// Calls rendered as `program arg arg`
    pub(crate) async fn command_lines(&self) -> Vec<String> {
        self.calls().await.iter().map(|c| c.display()).collect()
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let line = command.display();
        self.calls.lock().await.push(command);
        let rules = self.rules.lock().await;
        Ok(rules
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<(ChatMessage, Recipients, String)>>,
}

impl RecordingNotifier {
    pub(crate) async fn sent(&self) -> Vec<(ChatMessage, Recipients, String)> {
        self.sent.lock().await.clone()
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

/// Notifier whose transport is always down
pub(crate) struct FailingNotifier;

#[async_trait]
impl ChatNotifier for FailingNotifier {
    async fn send(
        &self,
        _message: &ChatMessage,
        _recipients: &Recipients,
        _id: &str,
    ) -> Result<(), PipelineError> {
        Err(PipelineError::Notification("chat API 500".to_string()))
    }
}

/// Credential provider returning a fixed secret, or failing when unset
pub(crate) struct StaticCredential(pub Option<String>);

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn resolve(&self, repo: &RepoIdentity) -> Result<String, PipelineError> {
        self.0
            .clone()
            .ok_or_else(|| PipelineError::Credential(format!("No key for {}", repo.slug())))
    }
}

/// Records listener callbacks as `event:step[:code]`
#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub(crate) async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl StepListener for RecordingListener {
    async fn starting(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError> {
        self.events.lock().await.push(format!("starting:{}", step));
        Ok(())
    }

    async fn skipped(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError> {
        self.events.lock().await.push(format!("skipped:{}", step));
        Ok(())
    }

    async fn completed(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
        result: &StepResult,
    ) -> Result<(), PipelineError> {
        self.events
            .lock()
            .await
            .push(format!("completed:{}:{}", step, result.code()));
        Ok(())
    }

    async fn failed(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
        _error: &PipelineError,
    ) -> Result<(), PipelineError> {
        self.events.lock().await.push(format!("failed:{}", step));
        Ok(())
    }
}

pub(crate) fn test_services(
    runner: Arc<MockRunner>,
    notifier: Arc<RecordingNotifier>,
    project_dir: &Path,
) -> Services {
    let mut users = HashMap::new();
    users.insert("octocat".to_string(), "U-octocat".to_string());

    Services {
        runner,
        credentials: Arc::new(StaticCredential(Some("{\"type\":\"service_account\"}".to_string()))),
        repositories: Arc::new(LocalProjectLoader::new(project_dir)),
        chat: notifier,
        directory: Arc::new(StaticDirectory::new(users)),
    }
}

pub(crate) fn test_context() -> ExecutionContext {
    test_context_with(Arc::new(RecordingNotifier::default()), Vec::new(), None)
}

pub(crate) fn test_context_with(
    notifier: Arc<RecordingNotifier>,
    channels: Vec<String>,
    author: Option<String>,
) -> ExecutionContext {
    let services = test_services(
        Arc::new(MockRunner::default()),
        notifier,
        &std::env::temp_dir(),
    );
    ExecutionContext::new(TriggerKind::Push, test_repo(), services)
        .with_linked_channels(channels)
        .with_author(author)
}
