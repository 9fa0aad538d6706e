//! Test: run history keeps results and transcripts

use crate::helpers::*;
use std::sync::Arc;
use tf_pipeline::core::{TerraformConfig, TriggerKind};
use tf_pipeline::handlers::{PushEvent, PushHandler};
use tf_pipeline::persistence::{InMemoryRunLog, RunLog};

#[tokio::test]
async fn test_transcript_recorded_without_chat_target() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    runner.respond("terraform plan", 1, "Error: Invalid provider configuration").await;
    let notifier = RecordingNotifier::new();
    let run_log = Arc::new(InMemoryRunLog::new());

    let handler = PushHandler::new(
        TerraformConfig::default(),
        services(runner, notifier.clone(), project.path()),
    )
    .with_run_log(run_log.clone());

    let result = handler
        .handle(PushEvent {
            repo: repo("main"),
            commit_url: None,
            author: None,
            linked_channels: Vec::new(),
        })
        .await;
    assert_eq!(result.code, 1);
    assert!(notifier.sent().await.is_empty());

    let runs = run_log.list_runs("acme/infra").await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.trigger, TriggerKind::Push);
    assert_eq!(run.code, 1);
    assert_eq!(run.branch, "main");
    assert!(run.reason.contains("Invalid provider configuration"));
    assert!(run.transcript.contains("Run Terraform Plan"));
    assert!(run.completed_at >= run.started_at);
}

#[tokio::test]
async fn test_skipped_push_not_recorded() {
    let project = project_with_backend();
    let run_log = Arc::new(InMemoryRunLog::new());
    let handler = PushHandler::new(
        TerraformConfig::from_yaml("restrict_branch: master\n").unwrap(),
        services(MockRunner::new(), RecordingNotifier::new(), project.path()),
    )
    .with_run_log(run_log.clone());

    handler
        .handle(PushEvent {
            repo: repo("feature-x"),
            commit_url: None,
            author: None,
            linked_channels: Vec::new(),
        })
        .await;

    assert!(run_log.list_repos().await.unwrap().is_empty());
}
