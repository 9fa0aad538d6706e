//! Terraform steps and their argument building

pub mod args;
pub mod backend;
pub mod steps;

pub use args::{build_tf_args, build_tf_vars, TfAction};
pub use backend::{scan_for_backend, BackendMatcher};
pub use steps::{
    terraform_steps, InitTerraform, LoadProject, RunTerraformApply, RunTerraformPlan,
    SelectWorkspaceTerraform, SetParameters, SetTerraformVersion, ValidateTerraform,
    APPLY_ACTION_LABEL, APPLY_COMMAND, STEP_COUNT,
};
