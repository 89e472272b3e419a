//! StateStore - SQLite-backed task, crew-run and phase state

use super::helpers::{
    format_timestamp, parse_status, row_to_phase, row_to_run, row_to_task, status_column,
};
use crate::error::{Error, Result};
use crate::record::{CrewRunRecord, PhaseRecord, StateSummary, TaskRecord, TaskUpdate};
use crate::status::Status;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Durable record of pipeline progress
#[derive(Clone)]
pub struct StateStore {
    pool: SqlitePool,
}

impl StateStore {
    /// Create a new state store with the given connection pool
    ///
    /// The caller is responsible for having run the schema setup, see
    /// [`StateStore::from_path`] for the usual entry point.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the state database at `db_path`
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Database(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!("State store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create a new in-memory state store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        debug!("In-memory state store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                crew_name TEXT NOT NULL,
                task_id TEXT NOT NULL,
                task_name TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                artifacts_path TEXT,
                metadata TEXT,
                UNIQUE(crew_name, task_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crew_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                crew_name TEXT NOT NULL,
                run_id TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS phases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phase_number INTEGER NOT NULL UNIQUE,
                phase_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tasks_crew_status
            ON tasks(crew_name, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_crew_runs_status
            ON crew_runs(status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Database migrations completed");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Task operations
    // =========================================================================

    /// Current status of a task, `None` when never recorded
    #[instrument(skip(self))]
    pub async fn get_task_status(&self, crew_name: &str, task_id: &str) -> Result<Option<Status>> {
        let row = sqlx::query("SELECT status FROM tasks WHERE crew_name = ?1 AND task_id = ?2")
            .bind(crew_name)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(status_column).transpose()
    }

    /// Full task record, `None` when never recorded
    #[instrument(skip(self))]
    pub async fn get_task(&self, crew_name: &str, task_id: &str) -> Result<Option<TaskRecord>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE crew_name = ?1 AND task_id = ?2")
            .bind(crew_name)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_task).transpose()
    }

    /// Insert or update a task's status
    ///
    /// An existing row keeps its identity, name and creation time. Optional
    /// fields in `update` that are `None` leave the stored values untouched.
    #[instrument(skip(self, update), fields(status = %status))]
    pub async fn set_task_status(
        &self,
        crew_name: &str,
        task_id: &str,
        status: Status,
        update: TaskUpdate,
    ) -> Result<()> {
        let now = format_timestamp(Utc::now());
        let metadata = update
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                crew_name, task_id, task_name, status,
                created_at, updated_at, artifacts_path, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7)
            ON CONFLICT(crew_name, task_id) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at,
                artifacts_path = COALESCE(excluded.artifacts_path, tasks.artifacts_path),
                metadata = COALESCE(excluded.metadata, tasks.metadata)
            "#,
        )
        .bind(crew_name)
        .bind(task_id)
        .bind(&update.task_name)
        .bind(status.as_str())
        .bind(&now)
        .bind(&update.artifacts_path)
        .bind(&metadata)
        .execute(&self.pool)
        .await?;

        debug!("Task {crew_name}/{task_id} -> {status}");
        Ok(())
    }

    /// Tasks of a crew that are still pending, in registration order
    #[instrument(skip(self))]
    pub async fn list_pending_tasks(&self, crew_name: &str) -> Result<Vec<TaskRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE crew_name = ?1 AND status = ?2 ORDER BY id ASC",
        )
        .bind(crew_name)
        .bind(Status::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_task).collect()
    }

    /// All tasks of a crew, in registration order
    #[instrument(skip(self))]
    pub async fn list_tasks(&self, crew_name: &str) -> Result<Vec<TaskRecord>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE crew_name = ?1 ORDER BY id ASC")
            .bind(crew_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_task).collect()
    }

    /// Whether a task already completed and must not be re-run
    ///
    /// Only `Completed` counts: failed, skipped and in-progress tasks are
    /// retried on the next run.
    pub async fn should_skip_task(&self, crew_name: &str, task_id: &str) -> Result<bool> {
        Ok(self.get_task_status(crew_name, task_id).await? == Some(Status::Completed))
    }

    // =========================================================================
    // Crew run operations
    // =========================================================================

    /// Mark a crew run as started
    ///
    /// Re-using a `run_id` restarts the existing row instead of adding one.
    #[instrument(skip(self))]
    pub async fn start_crew_run(&self, crew_name: &str, run_id: &str) -> Result<()> {
        let now = format_timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO crew_runs (crew_name, run_id, status, started_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(run_id) DO UPDATE SET
                status = excluded.status,
                started_at = excluded.started_at,
                completed_at = NULL,
                error_message = NULL
            "#,
        )
        .bind(crew_name)
        .bind(run_id)
        .bind(Status::InProgress.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!("Started crew run {run_id} for {crew_name}");
        Ok(())
    }

    /// Mark a crew run as finished
    ///
    /// A non-empty `error_message` finishes the run as `Failed`, anything
    /// else as `Completed`. Only an in-progress run can be finished.
    #[instrument(skip(self))]
    pub async fn complete_crew_run(&self, run_id: &str, error_message: Option<&str>) -> Result<()> {
        let error_message = error_message.filter(|m| !m.is_empty());
        let status = if error_message.is_some() {
            Status::Failed
        } else {
            Status::Completed
        };
        let now = format_timestamp(Utc::now());

        let result = sqlx::query(
            r#"
            UPDATE crew_runs
            SET status = ?1, completed_at = ?2, error_message = ?3
            WHERE run_id = ?4 AND status = ?5
            "#,
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(error_message)
        .bind(run_id)
        .bind(Status::InProgress.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_crew_run(run_id).await? {
                None => Err(Error::RunNotFound(run_id.to_string())),
                Some(run) => Err(Error::RunAlreadyFinished {
                    run_id: run_id.to_string(),
                    status: run.status,
                }),
            };
        }

        match error_message {
            Some(msg) => warn!("Crew run {run_id} failed: {msg}"),
            None => info!("Crew run {run_id} completed"),
        }
        Ok(())
    }

    /// Look up a crew run
    #[instrument(skip(self))]
    pub async fn get_crew_run(&self, run_id: &str) -> Result<Option<CrewRunRecord>> {
        let row = sqlx::query("SELECT * FROM crew_runs WHERE run_id = ?1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_run).transpose()
    }

    /// Crew runs with the given status, oldest first
    ///
    /// With `Status::InProgress` this lists runs a previous process left
    /// behind without finishing.
    #[instrument(skip(self))]
    pub async fn list_runs_with_status(&self, status: Status) -> Result<Vec<CrewRunRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM crew_runs WHERE status = ?1 ORDER BY started_at ASC, id ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_run).collect()
    }

    /// Most recently finished failed run
    #[instrument(skip(self))]
    pub async fn last_failed_run(&self) -> Result<Option<CrewRunRecord>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM crew_runs
            WHERE status = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(Status::Failed.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_run).transpose()
    }

    // =========================================================================
    // Phase operations
    // =========================================================================

    /// Record a phase status change
    ///
    /// `InProgress` creates or restarts the row. `Completed` and `Failed`
    /// only finish a phase that was previously started; for an unknown
    /// phase they change nothing.
    #[instrument(skip(self), fields(status = %status))]
    pub async fn set_phase_status(
        &self,
        phase_number: u32,
        phase_name: &str,
        status: Status,
    ) -> Result<()> {
        let now = format_timestamp(Utc::now());

        match status {
            Status::InProgress => {
                sqlx::query(
                    r#"
                    INSERT INTO phases (phase_number, phase_name, status, started_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(phase_number) DO UPDATE SET
                        phase_name = excluded.phase_name,
                        status = excluded.status,
                        started_at = excluded.started_at,
                        completed_at = NULL
                    "#,
                )
                .bind(i64::from(phase_number))
                .bind(phase_name)
                .bind(status.as_str())
                .bind(&now)
                .execute(&self.pool)
                .await?;
            }
            Status::Completed | Status::Failed => {
                let result = sqlx::query(
                    "UPDATE phases SET status = ?1, completed_at = ?2 WHERE phase_number = ?3",
                )
                .bind(status.as_str())
                .bind(&now)
                .bind(i64::from(phase_number))
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    warn!("Phase {phase_number} ({phase_name}) was never started, ignoring {status}");
                    return Ok(());
                }
            }
            Status::Pending | Status::Skipped => {
                sqlx::query(
                    r#"
                    INSERT INTO phases (phase_number, phase_name, status)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(phase_number) DO UPDATE SET
                        phase_name = excluded.phase_name,
                        status = excluded.status
                    "#,
                )
                .bind(i64::from(phase_number))
                .bind(phase_name)
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;
            }
        }

        info!("Phase {phase_number} ({phase_name}) -> {status}");
        Ok(())
    }

    /// Current status of a phase, `None` when never recorded
    #[instrument(skip(self))]
    pub async fn get_phase_status(&self, phase_number: u32) -> Result<Option<Status>> {
        let row = sqlx::query("SELECT status FROM phases WHERE phase_number = ?1")
            .bind(i64::from(phase_number))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(status_column).transpose()
    }

    /// All recorded phases ordered by number
    pub async fn list_phases(&self) -> Result<Vec<PhaseRecord>> {
        let rows = sqlx::query("SELECT * FROM phases ORDER BY phase_number ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_phase).collect()
    }

    // =========================================================================
    // Summary
    // =========================================================================

    /// Snapshot of task counts, run counts and phases
    ///
    /// All three reads share one transaction, so the snapshot is consistent.
    #[instrument(skip(self))]
    pub async fn get_summary(&self) -> Result<StateSummary> {
        let mut tx = self.pool.begin().await?;

        let task_rows = sqlx::query("SELECT status, COUNT(*) AS count FROM tasks GROUP BY status")
            .fetch_all(&mut *tx)
            .await?;
        let run_rows =
            sqlx::query("SELECT status, COUNT(*) AS count FROM crew_runs GROUP BY status")
                .fetch_all(&mut *tx)
                .await?;
        let phase_rows = sqlx::query("SELECT * FROM phases ORDER BY phase_number ASC")
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(StateSummary {
            task_counts: count_by_status(&task_rows)?,
            run_counts: count_by_status(&run_rows)?,
            phases: phase_rows
                .iter()
                .map(row_to_phase)
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

fn count_by_status(rows: &[sqlx::sqlite::SqliteRow]) -> Result<BTreeMap<Status, i64>> {
    let mut counts = BTreeMap::new();
    for row in rows {
        let status: String = row.try_get("status")?;
        let count: i64 = row.try_get("count")?;
        counts.insert(parse_status(&status)?, count);
    }
    Ok(counts)
}
