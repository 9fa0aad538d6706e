//! Test: apply command - resuming a planned run from its chat action

use crate::helpers::*;
use tf_pipeline::core::{PipelineError, ResumableSnapshot, TerraformConfig, CREDENTIAL_ENV_VAR};
use tf_pipeline::handlers::{ApplyCommand, CommandHandler, PushEvent, PushHandler};
use tf_pipeline::notify::Badge;
use tf_pipeline::terraform::{APPLY_ACTION_LABEL, APPLY_COMMAND};

#[tokio::test]
async fn test_plan_action_round_trip() {
    let project = project_with_backend();

    // Push: plan shows changes, auto-approve is off
    let runner = MockRunner::new();
    runner.respond("terraform plan", 2, "Plan: 2 to add, 1 to change, 0 to destroy.").await;
    let notifier = RecordingNotifier::new();
    let config = TerraformConfig::from_yaml(
        "workspace: prod\ncli_vars: [\"region=europe-west1\"]\nenv_vars: [\"TF_LOG=warn\"]\n",
    )
    .unwrap();
    let push = PushHandler::new(config, services(runner.clone(), notifier.clone(), project.path()));
    let result = push
        .handle(PushEvent {
            repo: repo("main"),
            commit_url: None,
            author: None,
            linked_channels: vec!["#infra-deploys".to_string()],
        })
        .await;
    assert!(result.is_success());
    assert!(runner.calls_to("terraform").await.iter().all(|c| c.args[0] != "apply"));

    let (plan_message, _, plan_id) = notifier
        .sent()
        .await
        .into_iter()
        .find(|(message, _, _)| !message.actions.is_empty())
        .unwrap();
    assert!(plan_id.ends_with("-plan"));
    let action = &plan_message.actions[0];
    assert_eq!(action.label, APPLY_ACTION_LABEL);
    assert_eq!(action.command, APPLY_COMMAND);

    let snapshot = ResumableSnapshot::from_json(&action.parameters["snapshot"]).unwrap();
    assert!(!snapshot.env_vars.contains_key(CREDENTIAL_ENV_VAR));
    assert_eq!(snapshot.env_vars.get("TF_LOG"), Some(&"warn".to_string()));
    assert_eq!(snapshot.workspace.as_deref(), Some("prod"));

    // Apply: same step list, apply explicitly requested
    let runner = MockRunner::new();
    runner.respond("terraform plan", 2, "Plan: 2 to add, 1 to change, 0 to destroy.").await;
    runner.respond("terraform apply", 0, "Apply complete! Resources: 2 added, 1 changed.").await;
    let notifier = RecordingNotifier::new();
    let command = ApplyCommand::from_parameters(&action.parameters).unwrap();
    let original_id = command.message_id.clone();
    let handler = CommandHandler::new(services(runner.clone(), notifier.clone(), project.path()));

    let result = handler.handle(command).await.unwrap();
    assert!(result.is_success());

    let apply = runner.calls_to("terraform").await.pop().unwrap();
    assert_eq!(
        apply.args,
        vec![
            "apply",
            "-auto-approve",
            "-input=false",
            "-no-color",
            "-var",
            "region=europe-west1",
        ]
    );
    assert!(apply.env.contains_key(CREDENTIAL_ENV_VAR));

    let progress = notifier.sent_to(&original_id).await;
    assert!(!progress.is_empty());
    assert_eq!(progress.last().unwrap().color, Badge::Success.color());
    assert!(notifier
        .sent()
        .await
        .iter()
        .all(|(message, _, _)| message.actions.is_empty()));
}

#[tokio::test]
async fn test_malformed_snapshot() {
    let project = project_with_backend();
    let runner = MockRunner::new();
    let handler = CommandHandler::new(services(runner.clone(), RecordingNotifier::new(), project.path()));

    let result = handler
        .handle(ApplyCommand {
            snapshot: "{\"base\": ".to_string(),
            message_id: "terraform-1".to_string(),
            commit_url: None,
            channels: Vec::new(),
            author: None,
        })
        .await;

    assert!(matches!(result, Err(PipelineError::Snapshot(_))));
    assert!(runner.calls().await.is_empty());
}
