//! Test: push trigger - branch filter, step gating and terraform arguments

use crate::helpers::*;
use std::sync::Arc;
use tf_pipeline::core::TerraformConfig;
use tf_pipeline::handlers::{PushEvent, PushHandler};
use tf_pipeline::notify::{Badge, Recipients};

fn push(branch: &str) -> PushEvent {
    PushEvent {
        repo: repo(branch),
        commit_url: Some("https://github.com/acme/infra/commit/3f2c1a9".to_string()),
        author: Some("octocat".to_string()),
        linked_channels: vec!["#infra-deploys".to_string()],
    }
}

fn config(yaml: &str) -> TerraformConfig {
    TerraformConfig::from_yaml(yaml).unwrap()
}

#[tokio::test]
async fn test_branch_filter() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    let notifier = RecordingNotifier::new();
    let handler = PushHandler::new(
        config("restrict_branch: master\n"),
        services(runner.clone(), notifier.clone(), project.path()),
    );

    let result = handler.handle(push("feature-x")).await;

    assert_eq!(result.code, 0);
    assert!(result.reason.starts_with("Skipped"));
    assert!(runner.calls().await.is_empty());
    assert!(notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_init_disabled_never_runs_init() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    let handler = PushHandler::new(
        config("disable_init: true\n"),
        services(runner.clone(), RecordingNotifier::new(), project.path()),
    );

    assert!(handler.handle(push("main")).await.is_success());
    assert!(!runner
        .command_lines()
        .await
        .iter()
        .any(|line| line.starts_with("terraform init")));
}

#[tokio::test]
async fn test_workspace_unset_never_selects() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    let handler = PushHandler::new(
        TerraformConfig::default(),
        services(runner.clone(), RecordingNotifier::new(), project.path()),
    );

    assert!(handler.handle(push("main")).await.is_success());
    assert!(!runner
        .command_lines()
        .await
        .iter()
        .any(|line| line.contains("workspace")));
}

#[tokio::test]
async fn test_version_install_fallback() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    runner.respond("tfenv use", 1, "tfenv: version '12.1.1' not installed").await;
    let handler = PushHandler::new(
        config("version: \"12.1.1\"\n"),
        services(runner.clone(), RecordingNotifier::new(), project.path()),
    );

    assert!(handler.handle(push("main")).await.is_success());

    let tfenv = runner.calls_to("tfenv").await;
    assert_eq!(tfenv.len(), 2);
    assert_eq!(tfenv[1].args, vec!["install", "12.1.1"]);
}

#[tokio::test]
async fn test_plan_args_and_no_apply_without_approval() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    runner.respond("terraform plan", 2, "Plan: 3 to add, 0 to change, 0 to destroy.").await;
    let handler = PushHandler::new(
        config("cli_vars: [\"foo=bar\"]\n"),
        services(runner.clone(), RecordingNotifier::new(), project.path()),
    );

    assert!(handler.handle(push("main")).await.is_success());

    let terraform = runner.calls_to("terraform").await;
    let plan = terraform
        .iter()
        .find(|call| call.args.first().map(String::as_str) == Some("plan"))
        .unwrap();
    assert_eq!(
        plan.args,
        vec!["plan", "-input=false", "-no-color", "-detailed-exitcode", "-var", "foo=bar"]
    );
    assert!(!terraform
        .iter()
        .any(|call| call.args.first().map(String::as_str) == Some("apply")));
}

#[tokio::test]
async fn test_auto_approve_apply_args() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    runner.respond("terraform plan", 2, "Plan: 1 to add").await;
    runner.respond("terraform apply", 0, "Apply complete! Resources: 1 added.").await;
    let notifier = RecordingNotifier::new();
    let handler = PushHandler::new(
        config("auto_approve: true\ncli_vars: [\"foo=bar\"]\n"),
        services(runner.clone(), notifier.clone(), project.path()),
    );

    let result = handler.handle(push("main")).await;
    assert!(result.is_success());

    let apply = runner.calls_to("terraform").await.pop().unwrap();
    assert_eq!(
        apply.args,
        vec!["apply", "-auto-approve", "-input=false", "-no-color", "-var", "foo=bar"]
    );

    // Progress lands on one message per run; its last state is success
    let progress: Vec<_> = notifier
        .sent()
        .await
        .into_iter()
        .filter(|(_, _, id)| id.starts_with("terraform-") && !id.ends_with("-plan"))
        .collect();
    assert!(!progress.is_empty());
    let last = &progress.last().unwrap().0;
    assert_eq!(last.color, Badge::Success.color());
    assert!(last.text.contains("Apply complete!"));
    assert!(progress.iter().all(|(_, _, id)| id == &progress[0].2));
}

#[tokio::test]
async fn test_auto_approve_without_changes_skips_apply() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    let notifier = RecordingNotifier::new();
    let handler = PushHandler::new(
        config("auto_approve: true\n"),
        services(runner.clone(), notifier.clone(), project.path()),
    );

    assert!(handler.handle(push("main")).await.is_success());
    assert!(!runner
        .command_lines()
        .await
        .iter()
        .any(|line| line.starts_with("terraform apply")));

    // Nothing to converge: the run settles as a success
    let last = notifier
        .sent()
        .await
        .into_iter()
        .filter(|(_, _, id)| !id.ends_with("-plan"))
        .last()
        .unwrap()
        .0;
    assert_eq!(last.color, Badge::Success.color());
}

#[tokio::test]
async fn test_chat_outage_stops_before_apply() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    runner.respond("terraform plan", 2, "Plan: 1 to add").await;
    let mut services = services(runner.clone(), RecordingNotifier::new(), project.path());
    services.chat = Arc::new(DownNotifier);
    let handler = PushHandler::new(config("auto_approve: true\n"), services);

    let result = handler.handle(push("main")).await;

    assert_eq!(result.code, 1);
    assert!(result.reason.contains("chat API 500"));
    assert!(runner.calls().await.is_empty());
}

#[tokio::test]
async fn test_missing_backend_is_code_3() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("main.tf"), "resource \"null_resource\" \"x\" {}\n").unwrap();
    let runner = MockRunner::new();
    let handler = PushHandler::new(
        TerraformConfig::default(),
        services(runner.clone(), RecordingNotifier::new(), project.path()),
    );

    let result = handler.handle(push("main")).await;
    assert_eq!(result.code, 3);
    assert!(!runner
        .command_lines()
        .await
        .iter()
        .any(|line| line.starts_with("terraform plan")));
}

#[tokio::test]
async fn test_validate_failure_is_code_2() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    runner.respond("terraform validate", 1, "Error: Reference to undeclared resource").await;
    let notifier = RecordingNotifier::new();
    let handler = PushHandler::new(
        TerraformConfig::default(),
        services(runner.clone(), notifier.clone(), project.path()),
    );

    let result = handler.handle(push("main")).await;
    assert_eq!(result.code, 2);
    assert!(result.reason.contains("undeclared resource"));

    let last = notifier.sent().await.pop().unwrap().0;
    assert_eq!(last.color, Badge::Failure.color());
}

#[tokio::test]
async fn test_base_without_tf_files_is_code_1() {
    let project = project_with_backend();
    std::fs::create_dir_all(project.path().join("docs")).unwrap();
    let runner = MockRunner::new();
    let handler = PushHandler::new(
        config("base: docs\n"),
        services(runner.clone(), RecordingNotifier::new(), project.path()),
    );

    let result = handler.handle(push("main")).await;
    assert_eq!(result.code, 1);
    assert!(runner.calls().await.is_empty());
}

#[tokio::test]
async fn test_recipient_preference() {
    let project = project_with_backend();

    // Linked channels first
    let notifier = RecordingNotifier::new();
    PushHandler::new(
        TerraformConfig::default(),
        services(MockRunner::new(), notifier.clone(), project.path()),
    )
    .handle(push("main"))
    .await;
    assert!(notifier
        .sent()
        .await
        .iter()
        .all(|(_, to, _)| to == &Recipients::Channels(vec!["#infra-deploys".to_string()])));

    // Then the author's chat user
    let notifier = RecordingNotifier::new();
    let mut event = push("main");
    event.linked_channels.clear();
    PushHandler::new(
        TerraformConfig::default(),
        services(MockRunner::new(), notifier.clone(), project.path()),
    )
    .handle(event.clone())
    .await;
    assert!(notifier
        .sent()
        .await
        .iter()
        .all(|(_, to, _)| to == &Recipients::Users(vec!["U042".to_string()])));

    // Nobody
    let notifier = RecordingNotifier::new();
    event.author = Some("unknown-dev".to_string());
    let result = PushHandler::new(
        TerraformConfig::default(),
        services(MockRunner::new(), notifier.clone(), project.path()),
    )
    .handle(event)
    .await;
    assert!(result.is_success());
    assert!(notifier.sent().await.is_empty());
}
