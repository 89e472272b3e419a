//! Process-backed crew executor
//!
//! Runs an external command per kickoff. The command learns what to do
//! from environment variables and reports back on stdout, one JSON object
//! per line:
//!
//! ```text
//! {"type":"task","task_id":"strategy_create_prd","status":"completed","artifacts_path":"artifacts/prd.md"}
//! {"type":"task","task_id":"strategy_create_roadmap","status":"failed","error":"timeout"}
//! {"type":"usage","agent_name":"Product Manager","model":"gpt-4o","input_tokens":1200,"output_tokens":800}
//! ```
//!
//! Any other output is logged. A line with a `type` field that does not
//! parse is logged as a warning, and fails its task when it names one.
//! Tasks the command never reports on are completed when it exits
//! successfully and failed otherwise.

use super::executor::{CrewExecutor, CrewKickoff, TaskOutcome};
use crate::error::{Error, Result};
use async_trait::async_trait;
use mastery_llm::UsageGovernor;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Status a crew process may report for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    /// Task done
    Completed,
    /// Task failed
    Failed,
}

/// A structured line written by a crew process
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrewMessage {
    /// Outcome of one task
    Task {
        /// Task identifier
        task_id: String,
        /// Outcome
        status: ReportedStatus,
        /// Artifact written by the task
        #[serde(default)]
        artifacts_path: Option<String>,
        /// Failure reason
        #[serde(default)]
        error: Option<String>,
    },
    /// Token usage of one LLM call made by the crew
    Usage {
        /// Agent that made the call
        agent_name: String,
        /// Model used
        model: String,
        /// Prompt tokens
        input_tokens: u64,
        /// Completion tokens
        output_tokens: u64,
        /// Start of the prompt
        #[serde(default)]
        prompt_preview: String,
        /// Start of the response
        #[serde(default)]
        response_preview: String,
    },
}

impl CrewMessage {
    /// Parse a stdout line
    ///
    /// `Ok(None)` for plain output, including JSON without a `type` field.
    /// A typed object that does not match a known message is an error.
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, serde_json::Error> {
        let line = line.trim();
        if !line.starts_with('{') {
            return Ok(None);
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            return Ok(None);
        };
        if value.get("type").is_none() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }
}

/// Executes crews by spawning a command
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    artifacts_dir: PathBuf,
    governor: Arc<UsageGovernor>,
}

impl ProcessExecutor {
    /// Create an executor running `program args...`
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, governor: Arc<UsageGovernor>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            artifacts_dir: PathBuf::from("artifacts"),
            governor,
        }
    }

    /// Run the command in `dir`
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Directory passed to the command as `MASTERY_ARTIFACTS_DIR`
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    fn command(&self, kickoff: &CrewKickoff<'_>) -> Command {
        let task_ids: Vec<&str> = kickoff.tasks.iter().map(|t| t.id.as_str()).collect();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("MASTERY_RUN_ID", kickoff.run_id)
            .env("MASTERY_PHASE", kickoff.phase.number.to_string())
            .env("MASTERY_PHASE_NAME", &kickoff.phase.name)
            .env("MASTERY_CREW", &kickoff.phase.crew)
            .env("MASTERY_TASKS", task_ids.join(","))
            .env("MASTERY_ARTIFACTS_DIR", &self.artifacts_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn handle_line(
        &self,
        crew: &str,
        line: &str,
        outcomes: &mut Vec<TaskOutcome>,
    ) -> Result<()> {
        let message = match CrewMessage::parse(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("[{crew}] malformed crew message ({e}): {line}");
                // A task report that cannot be read fails its task
                if let Some(task_id) = reported_task_id(line) {
                    outcomes.retain(|o| o.task_id != task_id);
                    outcomes.push(TaskOutcome::failed(
                        task_id,
                        format!("malformed task report: {e}"),
                    ));
                }
                return Ok(());
            }
        };

        match message {
            Some(CrewMessage::Task {
                task_id,
                status,
                artifacts_path,
                error,
            }) => {
                let outcome = match status {
                    ReportedStatus::Completed => TaskOutcome::completed(task_id, artifacts_path),
                    ReportedStatus::Failed => TaskOutcome::failed(
                        task_id,
                        error.unwrap_or_else(|| "task reported failure".to_string()),
                    ),
                };
                debug!("{crew} reported {:?}", outcome);
                outcomes.retain(|o| o.task_id != outcome.task_id);
                outcomes.push(outcome);
            }
            Some(CrewMessage::Usage {
                agent_name,
                model,
                input_tokens,
                output_tokens,
                prompt_preview,
                response_preview,
            }) => {
                self.governor.record_usage(
                    &agent_name,
                    &model,
                    input_tokens,
                    output_tokens,
                    &prompt_preview,
                    &response_preview,
                )?;
            }
            None => debug!(target: "mastery_core::crew_output", "[{crew}] {line}"),
        }
        Ok(())
    }
}

fn reported_task_id(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
    if value.get("type")?.as_str()? != "task" {
        return None;
    }
    value.get("task_id")?.as_str().map(str::to_string)
}

#[async_trait]
impl CrewExecutor for ProcessExecutor {
    fn name(&self) -> &str {
        &self.program
    }

    async fn kickoff(&self, kickoff: &CrewKickoff<'_>) -> Result<Vec<TaskOutcome>> {
        let crew = kickoff.phase.crew.as_str();
        info!("Launching {} for {crew} ({} tasks)", self.program, kickoff.tasks.len());

        let mut child = self
            .command(kickoff)
            .spawn()
            .map_err(|e| Error::Execution(format!("failed to start {}: {e}", self.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Execution("crew stdout not captured".to_string()))?;

        let mut outcomes = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            self.handle_line(crew, &line, &mut outcomes)?;
        }

        let status = child.wait().await?;
        if !status.success() {
            warn!("{} exited with {status} for {crew}", self.program);
        }

        for task in &kickoff.tasks {
            if outcomes.iter().any(|o| o.task_id == task.id) {
                continue;
            }
            outcomes.push(if status.success() {
                TaskOutcome::completed(task.id.clone(), None)
            } else {
                TaskOutcome::failed(task.id.clone(), format!("crew exited with {status}"))
            });
        }

        Ok(outcomes)
    }
}
