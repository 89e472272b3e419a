//! Pipeline runner

use super::executor::{CrewExecutor, CrewKickoff, TaskOutcome, TaskResult};
use super::phase::{FailurePolicy, PhaseSpec, TaskSpec};
use crate::artifacts::artifact_is_complete;
use crate::error::{Error, Result};
use mastery_llm::UsageGovernor;
use mastery_state::{CrewRunRecord, StateStore, Status, TaskUpdate};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// Error message recorded for runs stopped by an interruption
pub const INTERRUPTED: &str = "interrupted";

/// Runner tuning
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Directory crews write artifacts into
    pub artifacts_dir: PathBuf,
    /// Model for agents without an explicit one
    pub default_model: String,
    /// Pause before each crew kickoff
    pub task_delay: Duration,
    /// Treat tasks whose artifact already exists as done
    pub skip_existing_artifacts: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            default_model: "claude-sonnet-4-5-20250929".to_string(),
            task_delay: Duration::from_secs(2),
            skip_existing_artifacts: false,
        }
    }
}

/// How a phase ended
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseResult {
    /// Every pending task completed
    Completed,
    /// Nothing was left to do
    AlreadyComplete,
    /// At least one task failed
    Failed {
        /// Reason recorded on the crew run
        error: String,
    },
}

/// Summary of one phase execution
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    /// Phase number
    pub phase_number: u32,
    /// Phase name
    pub phase_name: String,
    /// Crew name
    pub crew_name: String,
    /// Crew run identifier
    pub run_id: String,
    /// Result
    pub result: PhaseResult,
    /// Tasks completed in this run
    pub completed_tasks: Vec<String>,
    /// Tasks not run (already completed or artifact present)
    pub skipped_tasks: Vec<String>,
    /// Tasks that failed in this run
    pub failed_tasks: Vec<String>,
}

impl PhaseOutcome {
    fn new(phase: &PhaseSpec, run_id: &str) -> Self {
        Self {
            phase_number: phase.number,
            phase_name: phase.name.clone(),
            crew_name: phase.crew.clone(),
            run_id: run_id.to_string(),
            result: PhaseResult::Completed,
            completed_tasks: Vec::new(),
            skipped_tasks: Vec::new(),
            failed_tasks: Vec::new(),
        }
    }

    /// Whether the phase failed
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.result, PhaseResult::Failed { .. })
    }
}

/// Outcomes of a pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    /// One entry per phase that ran, in order
    pub outcomes: Vec<PhaseOutcome>,
    /// Phase whose failure stopped the pipeline
    pub halted_at: Option<u32>,
}

impl PipelineReport {
    /// Whether every phase that ran succeeded
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.halted_at.is_none() && self.outcomes.iter().all(|o| !o.is_failure())
    }
}

/// Drives phases through the state store, the governor and a crew executor
pub struct PipelineRunner {
    store: StateStore,
    governor: Arc<UsageGovernor>,
    executor: Arc<dyn CrewExecutor>,
    settings: RunnerSettings,
    cancel: CancellationToken,
}

impl PipelineRunner {
    /// Create a runner
    #[must_use]
    pub fn new(
        store: StateStore,
        governor: Arc<UsageGovernor>,
        executor: Arc<dyn CrewExecutor>,
        settings: RunnerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            governor,
            executor,
            settings,
            cancel,
        }
    }

    /// State store used by the runner
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Governor used by the runner
    #[must_use]
    pub fn governor(&self) -> &UsageGovernor {
        &self.governor
    }

    /// Runs left in progress by a process that never finished them
    pub async fn abandoned_runs(&self) -> Result<Vec<CrewRunRecord>> {
        Ok(self.store.list_runs_with_status(Status::InProgress).await?)
    }

    /// Run phases in order, applying each phase's failure policy
    pub async fn run_all(&self, phases: &[PhaseSpec]) -> Result<PipelineReport> {
        for run in self.abandoned_runs().await? {
            warn!(
                "Crew run {} ({}) started at {} never finished; it may have been abandoned",
                run.run_id, run.crew_name, run.started_at
            );
        }

        let mut report = PipelineReport::default();
        for phase in phases {
            let outcome = self.run_phase(phase).await?;
            let failed = outcome.is_failure();
            report.outcomes.push(outcome);

            if failed {
                match phase.policy {
                    FailurePolicy::Halt => {
                        error!(
                            "Phase {} ({}) failed, stopping pipeline",
                            phase.number, phase.name
                        );
                        report.halted_at = Some(phase.number);
                        break;
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            "Phase {} ({}) failed, continuing with next phase",
                            phase.number, phase.name
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    /// Run a single phase
    ///
    /// Task and executor failures end up in the returned outcome. State
    /// store errors and cancellation are returned as errors after the run
    /// and phase have been marked failed.
    #[instrument(skip(self, phase), fields(phase = phase.number, crew = %phase.crew))]
    pub async fn run_phase(&self, phase: &PhaseSpec) -> Result<PhaseOutcome> {
        let run_id = new_run_id(&phase.crew);
        info!("Starting phase {}: {} ({run_id})", phase.number, phase.name);

        self.store.start_crew_run(&phase.crew, &run_id).await?;

        match self.execute(phase, &run_id).await {
            Ok(outcome) => {
                self.finish(phase, &outcome).await?;
                Ok(outcome)
            }
            Err(e) if e.is_cancellation() => {
                warn!("Phase {} interrupted", phase.number);
                self.abort(phase, &run_id, INTERRUPTED).await;
                Err(Error::Cancelled)
            }
            Err(e) => {
                self.abort(phase, &run_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, phase: &PhaseSpec, run_id: &str) -> Result<PhaseOutcome> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut outcome = PhaseOutcome::new(phase, run_id);
        let mut pending: Vec<&TaskSpec> = Vec::new();

        for task in &phase.tasks {
            if self.store.should_skip_task(&phase.crew, &task.id).await? {
                info!("Skipping completed task {}", task.id);
                outcome.skipped_tasks.push(task.id.clone());
                continue;
            }

            if self.settings.skip_existing_artifacts {
                if let Some(path) = self.artifact_path(task).filter(|p| artifact_is_complete(p)) {
                    info!("Artifact {} exists, skipping task {}", path.display(), task.id);
                    self.store
                        .set_task_status(
                            &phase.crew,
                            &task.id,
                            Status::Skipped,
                            TaskUpdate::new()
                                .named(&task.name)
                                .with_artifact(path.display().to_string()),
                        )
                        .await?;
                    outcome.skipped_tasks.push(task.id.clone());
                    continue;
                }
            }

            self.store
                .set_task_status(
                    &phase.crew,
                    &task.id,
                    Status::Pending,
                    TaskUpdate::new().named(&task.name),
                )
                .await?;
            pending.push(task);
        }

        self.store
            .set_phase_status(phase.number, &phase.name, Status::InProgress)
            .await?;

        if pending.is_empty() {
            info!("All tasks of phase {} already complete", phase.number);
            outcome.result = PhaseResult::AlreadyComplete;
            return Ok(outcome);
        }

        if let Err(e) = self.reserve_budget(phase).await {
            if e.is_cancellation() {
                return Err(e);
            }
            error!("Could not reserve LLM budget for {}: {e}", phase.crew);
            return self.fail_all(phase, &pending, &e.to_string(), outcome).await;
        }

        self.pause().await?;

        for task in &pending {
            self.store
                .set_task_status(&phase.crew, &task.id, Status::InProgress, TaskUpdate::new())
                .await?;
        }

        let kickoff = CrewKickoff {
            run_id,
            phase,
            tasks: pending.clone(),
        };

        let span = info_span!("crew_kickoff", executor = self.executor.name(), run_id);
        let started = Instant::now();
        let result = tokio::select! {
            r = self.executor.kickoff(&kickoff).instrument(span) => r,
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
        };
        info!(
            "Crew {} finished in {:.1}s",
            phase.crew,
            started.elapsed().as_secs_f64()
        );

        match result {
            Ok(reports) => self.record_outcomes(phase, &pending, reports, outcome).await,
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                error!("Crew {} failed: {e}", phase.crew);
                self.fail_all(phase, &pending, &e.to_string(), outcome).await
            }
        }
    }

    async fn reserve_budget(&self, phase: &PhaseSpec) -> Result<()> {
        for agent in &phase.agents {
            let model = agent
                .model
                .as_deref()
                .unwrap_or(&self.settings.default_model);
            let waited = self.governor.reserve(model, phase.estimated_tokens).await?;
            debug!(
                agent = %agent.name,
                model,
                "Reserved {} tokens after {:?}",
                phase.estimated_tokens,
                waited
            );
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if self.settings.task_delay.is_zero() {
            return Ok(());
        }
        debug!("Waiting {:?} before kickoff", self.settings.task_delay);
        tokio::select! {
            () = tokio::time::sleep(self.settings.task_delay) => Ok(()),
            () = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    async fn record_outcomes(
        &self,
        phase: &PhaseSpec,
        pending: &[&TaskSpec],
        reports: Vec<TaskOutcome>,
        mut outcome: PhaseOutcome,
    ) -> Result<PhaseOutcome> {
        let mut by_task: HashMap<String, TaskResult> = HashMap::new();
        for report in reports {
            if phase.task(&report.task_id).is_none() {
                warn!("Crew {} reported unknown task {}", phase.crew, report.task_id);
                continue;
            }
            by_task.insert(report.task_id, report.result);
        }

        for task in pending {
            let result = by_task.remove(&task.id).unwrap_or_else(|| TaskResult::Failed {
                error: "no outcome reported by crew".to_string(),
            });

            match result {
                TaskResult::Completed { artifacts_path } => {
                    let artifact = artifacts_path.or_else(|| {
                        self.artifact_path(task).map(|p| p.display().to_string())
                    });
                    let mut update = TaskUpdate::new();
                    if let Some(artifact) = artifact {
                        update = update.with_artifact(artifact);
                    }
                    self.store
                        .set_task_status(&phase.crew, &task.id, Status::Completed, update)
                        .await?;
                    outcome.completed_tasks.push(task.id.clone());
                }
                TaskResult::Failed { error } => {
                    warn!("Task {} failed: {error}", task.id);
                    self.store
                        .set_task_status(
                            &phase.crew,
                            &task.id,
                            Status::Failed,
                            TaskUpdate::new().with_metadata(json!({ "error": error })),
                        )
                        .await?;
                    outcome.failed_tasks.push(task.id.clone());
                }
            }
        }

        if !outcome.failed_tasks.is_empty() {
            outcome.result = PhaseResult::Failed {
                error: format!(
                    "{} of {} tasks failed: {}",
                    outcome.failed_tasks.len(),
                    pending.len(),
                    outcome.failed_tasks.join(", ")
                ),
            };
        }
        Ok(outcome)
    }

    async fn fail_all(
        &self,
        phase: &PhaseSpec,
        pending: &[&TaskSpec],
        reason: &str,
        mut outcome: PhaseOutcome,
    ) -> Result<PhaseOutcome> {
        for task in pending {
            self.store
                .set_task_status(
                    &phase.crew,
                    &task.id,
                    Status::Failed,
                    TaskUpdate::new().with_metadata(json!({ "error": reason })),
                )
                .await?;
            outcome.failed_tasks.push(task.id.clone());
        }
        outcome.result = PhaseResult::Failed {
            error: reason.to_string(),
        };
        Ok(outcome)
    }

    async fn finish(&self, phase: &PhaseSpec, outcome: &PhaseOutcome) -> Result<()> {
        match &outcome.result {
            PhaseResult::Completed | PhaseResult::AlreadyComplete => {
                self.store
                    .set_phase_status(phase.number, &phase.name, Status::Completed)
                    .await?;
                self.store.complete_crew_run(&outcome.run_id, None).await?;
                info!("Phase {} ({}) completed", phase.number, phase.name);
            }
            PhaseResult::Failed { error } => {
                self.store
                    .set_phase_status(phase.number, &phase.name, Status::Failed)
                    .await?;
                self.store
                    .complete_crew_run(&outcome.run_id, Some(error.as_str()))
                    .await?;
                error!("Phase {} ({}) failed: {error}", phase.number, phase.name);
            }
        }
        Ok(())
    }

    /// Best-effort bookkeeping for a phase that could not finish normally
    async fn abort(&self, phase: &PhaseSpec, run_id: &str, reason: &str) {
        if let Err(e) = self.store.complete_crew_run(run_id, Some(reason)).await {
            warn!("Could not mark crew run {run_id} failed: {e}");
        }
        if let Err(e) = self
            .store
            .set_phase_status(phase.number, &phase.name, Status::Failed)
            .await
        {
            warn!("Could not mark phase {} failed: {e}", phase.number);
        }
    }

    fn artifact_path(&self, task: &TaskSpec) -> Option<PathBuf> {
        task.artifact
            .as_ref()
            .map(|name| self.settings.artifacts_dir.join(name))
    }
}

/// `<crew>_<8 hex chars>`
fn new_run_id(crew_name: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{crew_name}_{}", &id[..8])
}
