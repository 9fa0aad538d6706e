//! SQLite-based run history

use crate::core::TriggerKind;
use crate::persistence::{RunLog, RunRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

const RUN_COLUMNS: &str =
    "id, repo, sha, branch, trigger, code, reason, transcript, started_at, completed_at";

/// SQLite run log
pub struct SqliteRunLog {
    pool: SqlitePool,
}

impl SqliteRunLog {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open run history at {}", db_path.display()))?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// A private in-memory database
    pub async fn in_memory() -> Result<Self> {
        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory run history")?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Create store under the user's local data directory
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("tf-pipeline");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        Self::new(&db_dir.join("runs.db")).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                repo TEXT NOT NULL,
                sha TEXT NOT NULL,
                branch TEXT NOT NULL,
                trigger TEXT NOT NULL,
                code INTEGER NOT NULL,
                reason TEXT NOT NULL,
                transcript TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_repo ON runs(repo);
            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create run history schema")?;

        Ok(())
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn record_from_row(row: &SqliteRow) -> Result<RunRecord> {
        let trigger: String = row.get("trigger");
        Ok(RunRecord {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            repo: row.get("repo"),
            sha: row.get("sha"),
            branch: row.get("branch"),
            trigger: TriggerKind::parse(&trigger)
                .with_context(|| format!("Unknown trigger in run history: {}", trigger))?,
            code: row.get::<i64, _>("code") as i32,
            reason: row.get("reason"),
            transcript: row.get("transcript"),
            started_at: Self::from_naive(row.get("started_at")),
            completed_at: Self::from_naive(row.get("completed_at")),
        })
    }
}

#[async_trait::async_trait]
impl RunLog for SqliteRunLog {
    async fn save_run(&self, record: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, repo, sha, branch, trigger, code, reason, transcript, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(record.run_id.to_string())
        .bind(&record.repo)
        .bind(&record.sha)
        .bind(&record.branch)
        .bind(record.trigger.as_str())
        .bind(record.code as i64)
        .bind(&record.reason)
        .bind(&record.transcript)
        .bind(record.started_at.naive_utc())
        .bind(record.completed_at.naive_utc())
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load run")?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn list_runs(&self, repo: &str) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM runs WHERE repo = ?1 ORDER BY started_at DESC",
            RUN_COLUMNS
        ))
        .bind(repo)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn list_repos(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT repo FROM runs ORDER BY repo ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list repositories")?;

        Ok(rows.iter().map(|row| row.get("repo")).collect())
    }
}
