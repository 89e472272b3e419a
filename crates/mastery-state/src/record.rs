//! Row types returned by the state store

use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single unit of agent work, keyed by `(crew_name, task_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Crew that owns the task
    pub crew_name: String,
    /// Stable task identifier within the crew
    pub task_id: String,
    /// Human readable name (set on first insert)
    pub task_name: String,
    /// Current status
    pub status: Status,
    /// When the row was first written
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
    /// Artifact produced by the task
    pub artifacts_path: Option<String>,
    /// Free-form metadata (JSON object)
    pub metadata: Option<serde_json::Value>,
}

/// Optional fields accompanying a task status change
///
/// Fields left as `None` never clear previously stored values.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// Task name, only used when the row is created
    pub task_name: String,
    /// Artifact path
    pub artifacts_path: Option<String>,
    /// Metadata object
    pub metadata: Option<serde_json::Value>,
}

impl TaskUpdate {
    /// Create an empty update
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.task_name = name.into();
        self
    }

    /// Set the artifact path
    #[must_use]
    pub fn with_artifact(mut self, path: impl Into<String>) -> Self {
        self.artifacts_path = Some(path.into());
        self
    }

    /// Set the metadata object
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One execution attempt of a crew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewRunRecord {
    /// Crew name
    pub crew_name: String,
    /// Unique run identifier
    pub run_id: String,
    /// Current status
    pub status: Status,
    /// When the run (most recently) started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason, present only for failed runs
    pub error_message: Option<String>,
}

/// Pipeline phase progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Phase number (1-based, unique)
    pub phase_number: u32,
    /// Phase name
    pub phase_name: String,
    /// Current status
    pub status: Status,
    /// When the phase started
    pub started_at: Option<DateTime<Utc>>,
    /// When the phase finished
    pub completed_at: Option<DateTime<Utc>>,
}

/// Point-in-time overview of the whole store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    /// Number of tasks per status
    pub task_counts: BTreeMap<Status, i64>,
    /// Number of crew runs per status
    pub run_counts: BTreeMap<Status, i64>,
    /// All phases ordered by number
    pub phases: Vec<PhaseRecord>,
}

impl StateSummary {
    /// Total number of tasks
    #[must_use]
    pub fn total_tasks(&self) -> i64 {
        self.task_counts.values().sum()
    }

    /// Task count for a status (zero when absent)
    #[must_use]
    pub fn tasks_with(&self, status: Status) -> i64 {
        self.task_counts.get(&status).copied().unwrap_or(0)
    }

    /// Run count for a status (zero when absent)
    #[must_use]
    pub fn runs_with(&self, status: Status) -> i64 {
        self.run_counts.get(&status).copied().unwrap_or(0)
    }
}
