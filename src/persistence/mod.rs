//! Run history
//!
//! Every finished run is recorded with its transcript, so progress stays
//! readable when nobody could be notified in chat.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunLog;

use crate::core::{ExecutionContext, PipelineResult, TriggerKind};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A finished pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,

    /// `owner/repo`
    pub repo: String,

    pub sha: String,

    pub branch: String,

    pub trigger: TriggerKind,

    /// Final pipeline code
    pub code: i32,

    pub reason: String,

    pub transcript: String,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl RunRecord {
    /// Record the outcome of the run described by `context`
    pub fn new(
        context: &ExecutionContext,
        result: &PipelineResult,
        transcript: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: context.run_id,
            repo: context.repo.slug(),
            sha: context.repo.sha.clone(),
            branch: context.repo.branch.clone(),
            trigger: context.trigger,
            code: result.code,
            reason: result.reason.clone(),
            transcript,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// Trait for run history backends
#[async_trait::async_trait]
pub trait RunLog: Send + Sync {
    /// Save a finished run
    async fn save_run(&self, record: &RunRecord) -> Result<()>;

    /// Load a run by id
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunRecord>>;

    /// Runs of a repository, newest first
    async fn list_runs(&self, repo: &str) -> Result<Vec<RunRecord>>;

    /// Every repository with recorded runs
    async fn list_repos(&self) -> Result<Vec<String>>;
}

/// In-memory run history (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryRunLog {
    runs: RwLock<HashMap<Uuid, RunRecord>>,
    by_repo: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RunLog for InMemoryRunLog {
    async fn save_run(&self, record: &RunRecord) -> Result<()> {
        let mut runs = self.runs.write().await;
        if runs.insert(record.run_id, record.clone()).is_none() {
            self.by_repo
                .write()
                .await
                .entry(record.repo.clone())
                .or_default()
                .push(record.run_id);
        }
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, repo: &str) -> Result<Vec<RunRecord>> {
        let runs = self.runs.read().await;
        let by_repo = self.by_repo.read().await;

        let mut result: Vec<RunRecord> = by_repo
            .get(repo)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_repos(&self) -> Result<Vec<String>> {
        let mut repos: Vec<String> = self.by_repo.read().await.keys().cloned().collect();
        repos.sort();
        Ok(repos)
    }
}
