//! Terraform argument building
//!
//! Pure functions over a [`Registration`]; nothing here mutates it or checks
//! that flags are meaningful to terraform.

use crate::core::Registration;
use std::fmt;

/// Terraform subcommands that take the shared argument set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfAction {
    Plan,
    Apply,
    Destroy,
}

impl TfAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TfAction::Plan => "plan",
            TfAction::Apply => "apply",
            TfAction::Destroy => "destroy",
        }
    }

    /// Flags that always lead the argument list of this action
    fn prefix(&self) -> &'static [&'static str] {
        match self {
            TfAction::Plan => &[],
            TfAction::Apply => &["-auto-approve"],
            TfAction::Destroy => &["-force"],
        }
    }
}

impl fmt::Display for TfAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `-var name=value` pairs in input order, then one `-var-file=<path>` per file
pub fn build_tf_vars(registration: &Registration) -> Vec<String> {
    let vars = registration
        .cli_vars
        .iter()
        .flat_map(|var| ["-var".to_string(), format!("{}={}", var.tf_var, var.value)]);
    let files = registration
        .var_files
        .iter()
        .map(|path| format!("-var-file={}", path));
    vars.chain(files).collect()
}

/// Action prefix, `-input=false`, then the user's CLI arguments in input order
pub fn build_tf_args(action: TfAction, registration: &Registration) -> Vec<String> {
    action
        .prefix()
        .iter()
        .map(|flag| flag.to_string())
        .chain(std::iter::once("-input=false".to_string()))
        .chain(registration.cli_args.iter().map(|arg| arg.render()))
        .collect()
}

/// Complete terraform argument vector for `action`
///
/// `fixed` flags are placed right after `-input=false`, ahead of the user's
/// arguments, so they never leak into the registration.
pub fn command_args(action: TfAction, fixed: &[&str], registration: &Registration) -> Vec<String> {
    let mut args = build_tf_args(action, registration);
    let at = action.prefix().len() + 1;
    args.splice(at..at, fixed.iter().map(|flag| flag.to_string()));

    std::iter::once(action.as_str().to_string())
        .chain(args)
        .chain(build_tf_vars(registration))
        .collect()
}
