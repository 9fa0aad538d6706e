//! Pipeline outcome models

use serde::{Deserialize, Serialize};

/// Reason reported when every step succeeded or was skipped
pub const SUCCESS_REASON: &str = "Success";

/// Aggregate result of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// 0 on success, otherwise the first nonzero step code
    pub code: i32,
    pub reason: String,
}

impl PipelineResult {
    pub fn success() -> Self {
        Self {
            code: 0,
            reason: SUCCESS_REASON.to_string(),
        }
    }

    /// A zero-code result that did nothing, e.g. a filtered push
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            code: 0,
            reason: reason.into(),
        }
    }

    pub fn failure(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// What started a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// A git push
    Push,
    /// The "Run Apply" command
    Apply,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Push => "push",
            TriggerKind::Apply => "apply",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "push" => Some(TriggerKind::Push),
            "apply" => Some(TriggerKind::Apply),
            _ => None,
        }
    }
}
