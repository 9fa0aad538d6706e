//! The terraform steps, in pipeline order
//!
//! set parameters → load project → set version → init → validate →
//! select workspace → plan → apply

use crate::core::{
    ExecutionContext, PipelineError, PlanOutcome, Registration, ResumableSnapshot, Step,
    StepResult, TerraformConfig, CREDENTIAL_ENV_VAR,
};
use crate::notify::{
    format_block, resolve_recipients, Badge, ChatAction, ChatMessage, MAX_BLOCK_LINES,
};
use crate::process::{ProcessCommand, ProcessOutput};
use crate::terraform::args::{build_tf_vars, command_args, TfAction};
use crate::terraform::backend::{find_tf_files, scan_for_backend};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Label of the chat action that resumes a run at apply
pub const APPLY_ACTION_LABEL: &str = "Run Apply";

/// Command name carried by the apply action
pub const APPLY_COMMAND: &str = "apply";

/// Number of steps in [`terraform_steps`]
pub const STEP_COUNT: usize = 8;

const PLAN_FLAGS: &[&str] = &["-no-color", "-detailed-exitcode"];
const APPLY_FLAGS: &[&str] = &["-no-color"];

/// Build the full terraform pipeline, starting with `parameters`
pub fn terraform_steps(parameters: SetParameters) -> Vec<Box<dyn Step>> {
    vec![
        Box::new(parameters),
        Box::new(LoadProject),
        Box::new(SetTerraformVersion),
        Box::new(InitTerraform),
        Box::new(ValidateTerraform),
        Box::new(SelectWorkspaceTerraform),
        Box::new(RunTerraformPlan),
        Box::new(RunTerraformApply),
    ]
}

/// Run `program` in the terraform working directory with the run's environment
async fn run_tool(
    context: &ExecutionContext,
    registration: &Registration,
    program: &str,
    args: Vec<String>,
) -> Result<ProcessOutput, PipelineError> {
    let mut command = ProcessCommand::new(program, args)
        .envs(&registration.env_vars)
        .log_output(context.log_level.is_debug());
    if let Some(dir) = registration.working_dir() {
        command = command.current_dir(dir);
    }
    Ok(context.services.runner.run(command).await?)
}

async fn terraform(
    context: &ExecutionContext,
    registration: &Registration,
    args: Vec<String>,
) -> Result<ProcessOutput, PipelineError> {
    if registration.project.is_none() {
        return Err(PipelineError::MissingState("project"));
    }
    run_tool(context, registration, "terraform", args).await
}

/// Output of a failed command, or a generic line when it printed nothing
fn failure_text(output: &ProcessOutput, what: &str) -> String {
    let text = output.combined();
    if text.is_empty() {
        format!("{} exited with code {}", what, output.status)
    } else {
        text
    }
}

enum ParameterSource {
    Config(TerraformConfig),
    Snapshot(ResumableSnapshot),
}

/// Populate the registration and inject the cloud credential
pub struct SetParameters {
    source: ParameterSource,
}

impl SetParameters {
    pub fn from_config(config: TerraformConfig) -> Self {
        Self {
            source: ParameterSource::Config(config),
        }
    }

    /// Resume from a snapshot; the resumed run always requests apply
    pub fn from_snapshot(snapshot: ResumableSnapshot) -> Self {
        Self {
            source: ParameterSource::Snapshot(snapshot),
        }
    }
}

#[async_trait]
impl Step for SetParameters {
    fn name(&self) -> &str {
        "Set Parameters"
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        match &self.source {
            ParameterSource::Config(config) => {
                registration.env_vars.extend(config.parsed_env_vars()?);
                registration.cli_vars.extend(config.parsed_cli_vars()?);
                registration.cli_args.extend(config.parsed_cli_args()?);
                registration.var_files.extend(config.var_files.iter().cloned());
                registration.base = config.base.clone();
                registration.workspace = config.workspace.clone();
                registration.disable_init = config.disable_init;
                registration.auto_approve = config.auto_approve;
                registration.version = config.version.clone();
                registration.repo = context.repo.clone();
            }
            ParameterSource::Snapshot(snapshot) => {
                snapshot.restore_into(registration);
                registration.apply_requested = true;
            }
        }

        let credential = context
            .services
            .credentials
            .resolve(&registration.repo)
            .await?;
        registration
            .env_vars
            .insert(CREDENTIAL_ENV_VAR.to_string(), credential);

        debug!(
            "Parameters set for {}: base={:?} workspace={:?} auto_approve={}",
            registration.repo.slug(),
            registration.base,
            registration.workspace,
            registration.auto_approve
        );
        Ok(StepResult::ok().hidden())
    }
}

/// Load the repository and check the base directory holds terraform files
pub struct LoadProject;

#[async_trait]
impl Step for LoadProject {
    fn name(&self) -> &str {
        "Load Project"
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        let project = context
            .services
            .repositories
            .load(&registration.repo, context.git_token.as_deref())
            .await?;
        info!("Loaded {} at {}", registration.repo.slug(), project.root().display());
        // The checked-out commit replaces whatever the trigger reported
        if let Some(identity) = &project.identity {
            registration.repo = identity.clone();
        }
        registration.project = Some(project);

        let dir = registration
            .working_dir()
            .ok_or(PipelineError::MissingState("project"))?;
        let base = registration.base.as_deref().unwrap_or(".");

        if !dir.is_dir() {
            return Ok(StepResult::failed(
                1,
                format!("Base path `{}` does not exist in the repository", base),
            ));
        }
        if find_tf_files(&dir, false).is_empty() {
            return Ok(StepResult::failed(
                1,
                format!("No terraform (*.tf) files found in `{}`", base),
            ));
        }
        Ok(StepResult::ok())
    }
}

/// Activate the configured terraform version through tfenv
pub struct SetTerraformVersion;

#[async_trait]
impl Step for SetTerraformVersion {
    fn name(&self) -> &str {
        "Set Terraform Version"
    }

    fn run_when(&self, _context: &ExecutionContext, registration: &Registration) -> bool {
        registration.version.is_some()
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        let version = registration
            .version
            .clone()
            .ok_or(PipelineError::MissingState("version"))?;

        let used = run_tool(context, registration, "tfenv", vec!["use".to_string(), version.clone()]).await?;
        if used.success() {
            return Ok(StepResult::ok());
        }

        info!("Terraform {} not installed, installing", version);
        let installed =
            run_tool(context, registration, "tfenv", vec!["install".to_string(), version.clone()]).await?;
        if installed.success() {
            Ok(StepResult::ok())
        } else {
            Ok(StepResult::failed(1, failure_text(&installed, "tfenv install")))
        }
    }
}

pub struct InitTerraform;

#[async_trait]
impl Step for InitTerraform {
    fn name(&self) -> &str {
        "Init Terraform"
    }

    fn run_when(&self, _context: &ExecutionContext, registration: &Registration) -> bool {
        !registration.disable_init
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        let args = std::iter::once("init".to_string())
            .chain(build_tf_vars(registration))
            .collect();
        let output = terraform(context, registration, args).await?;
        if output.success() {
            Ok(StepResult::ok())
        } else {
            Ok(StepResult::failed(1, failure_text(&output, "terraform init")))
        }
    }
}

/// `terraform validate`, then require a backend block
pub struct ValidateTerraform;

#[async_trait]
impl Step for ValidateTerraform {
    fn name(&self) -> &str {
        "Validate Terraform"
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        let output = terraform(context, registration, vec!["validate".to_string()]).await?;
        if !output.success() {
            return Ok(StepResult::failed(2, failure_text(&output, "terraform validate")));
        }

        let dir = registration
            .working_dir()
            .ok_or(PipelineError::MissingState("project"))?;
        if !scan_for_backend(&dir).await? {
            return Ok(StepResult::failed(
                3,
                "No `backend` block found in any terraform block; state would be kept on the runner",
            ));
        }
        Ok(StepResult::ok())
    }
}

pub struct SelectWorkspaceTerraform;

#[async_trait]
impl Step for SelectWorkspaceTerraform {
    fn name(&self) -> &str {
        "Select Workspace"
    }

    fn run_when(&self, _context: &ExecutionContext, registration: &Registration) -> bool {
        registration.workspace.is_some()
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        let workspace = registration
            .workspace
            .clone()
            .ok_or(PipelineError::MissingState("workspace"))?;
        let args = vec!["workspace".to_string(), "select".to_string(), workspace];
        let output = terraform(context, registration, args).await?;
        if output.success() {
            Ok(StepResult::ok())
        } else {
            Ok(StepResult::failed(1, failure_text(&output, "terraform workspace select")))
        }
    }
}

/// `terraform plan` with detailed exit codes
///
/// The plan is posted as its own chat message. When changes are pending and
/// nothing will apply them in this run, the message carries a "Run Apply"
/// action holding the resumable snapshot.
pub struct RunTerraformPlan;

impl RunTerraformPlan {
    fn apply_action(
        context: &ExecutionContext,
        registration: &Registration,
    ) -> Result<ChatAction, PipelineError> {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "snapshot".to_string(),
            ResumableSnapshot::capture(registration).to_json()?,
        );
        parameters.insert("message_id".to_string(), context.message_id.clone());
        if let Some(url) = &context.commit_url {
            parameters.insert("commit_url".to_string(), url.clone());
        }
        if !context.linked_channels.is_empty() {
            parameters.insert("channels".to_string(), context.linked_channels.join(","));
        }
        if let Some(author) = &context.author {
            parameters.insert("author".to_string(), author.clone());
        }

        Ok(ChatAction {
            label: APPLY_ACTION_LABEL.to_string(),
            command: APPLY_COMMAND.to_string(),
            parameters,
        })
    }

    fn plan_message(
        context: &ExecutionContext,
        registration: &Registration,
        outcome: PlanOutcome,
        output: &str,
    ) -> Result<ChatMessage, PipelineError> {
        let awaiting_approval = outcome == PlanOutcome::ChangesPresent
            && !registration.auto_approve
            && !registration.apply_requested;

        let summary = match outcome {
            PlanOutcome::NoChanges => "No changes. Infrastructure is up to date.",
            PlanOutcome::ChangesPresent if awaiting_approval => {
                "Changes pending. Review the plan and run apply to converge."
            }
            PlanOutcome::ChangesPresent => "Changes pending. Applying.",
        };

        let mut actions = Vec::new();
        if awaiting_approval {
            actions.push(Self::apply_action(context, registration)?);
        }

        Ok(ChatMessage {
            title: format!("Terraform plan ▸ {}", registration.repo.slug()),
            text: format!("{}\n{}", summary, format_block(output, MAX_BLOCK_LINES)),
            color: if awaiting_approval {
                Badge::Skipped.color().to_string()
            } else {
                Badge::Success.color().to_string()
            },
            footer: Some(format!(
                "{}@{}",
                registration.repo.branch,
                registration.repo.short_sha()
            )),
            actions,
        })
    }
}

#[async_trait]
impl Step for RunTerraformPlan {
    fn name(&self) -> &str {
        "Run Terraform Plan"
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        let args = command_args(TfAction::Plan, PLAN_FLAGS, registration);
        let output = terraform(context, registration, args).await?;

        let outcome = match output.status {
            0 => PlanOutcome::NoChanges,
            2 => PlanOutcome::ChangesPresent,
            _ => return Ok(StepResult::failed(1, failure_text(&output, "terraform plan"))),
        };
        registration.plan = Some(outcome);
        let text = output.combined();

        if let Some(recipients) = resolve_recipients(context).await {
            let message = Self::plan_message(context, registration, outcome, &text)?;
            let id = format!("{}-plan", context.message_id);
            context.services.chat.send(&message, &recipients, &id).await?;
        }

        Ok(StepResult::ok_with_output(text))
    }
}

/// `terraform apply`, when approved up front or explicitly requested
pub struct RunTerraformApply;

#[async_trait]
impl Step for RunTerraformApply {
    fn name(&self) -> &str {
        "Run Terraform Apply"
    }

    fn run_when(&self, _context: &ExecutionContext, registration: &Registration) -> bool {
        registration.apply_requested
            || (registration.auto_approve && registration.plan != Some(PlanOutcome::NoChanges))
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        registration: &mut Registration,
    ) -> Result<StepResult, PipelineError> {
        let args = command_args(TfAction::Apply, APPLY_FLAGS, registration);
        let output = terraform(context, registration, args).await?;

        if output.success() {
            Ok(StepResult::ok_with_output(output.combined()))
        } else {
            Ok(StepResult::failed(output.status, failure_text(&output, "terraform apply")))
        }
    }
}
