//! Crew executor contract

use super::phase::{PhaseSpec, TaskSpec};
use crate::error::Result;
use async_trait::async_trait;

/// Work handed to a crew
#[derive(Debug, Clone)]
pub struct CrewKickoff<'a> {
    /// Run identifier recorded in the state store
    pub run_id: &'a str,
    /// Phase being executed
    pub phase: &'a PhaseSpec,
    /// Tasks still to do, in declared order
    pub tasks: Vec<&'a TaskSpec>,
}

/// Result of one task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    /// The task produced its output
    Completed {
        /// Where the output was written, if different from the declared artifact
        artifacts_path: Option<String>,
    },
    /// The task failed
    Failed {
        /// Failure reason
        error: String,
    },
}

/// Outcome reported by a crew for one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    /// Task identifier
    pub task_id: String,
    /// What happened
    pub result: TaskResult,
}

impl TaskOutcome {
    /// Successful outcome
    #[must_use]
    pub fn completed(task_id: impl Into<String>, artifacts_path: Option<String>) -> Self {
        Self {
            task_id: task_id.into(),
            result: TaskResult::Completed { artifacts_path },
        }
    }

    /// Failed outcome
    #[must_use]
    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            result: TaskResult::Failed {
                error: error.into(),
            },
        }
    }
}

/// Runs a crew's tasks
///
/// Implementations execute the tasks of a kickoff sequentially and report
/// one outcome per task. Tasks without a reported outcome are treated as
/// failed. Returning `Err` fails every task of the kickoff.
#[async_trait]
pub trait CrewExecutor: Send + Sync {
    /// Executor name for logs
    fn name(&self) -> &str;

    /// Execute the kickoff's tasks
    async fn kickoff(&self, kickoff: &CrewKickoff<'_>) -> Result<Vec<TaskOutcome>>;
}
