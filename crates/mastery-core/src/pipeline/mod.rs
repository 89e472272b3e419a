//! Pipeline - phase sequencing
//!
//! Phases run strictly in order. Each phase starts a crew run, registers
//! its tasks, hands the unfinished ones to a [`CrewExecutor`] and records
//! the outcome, so an interrupted pipeline resumes where it stopped.

mod executor;
mod phase;
mod process;
mod runner;

pub use executor::{CrewExecutor, CrewKickoff, TaskOutcome, TaskResult};
pub use phase::{default_catalog, AgentSpec, FailurePolicy, PhaseSpec, TaskSpec};
pub use process::{CrewMessage, ProcessExecutor, ReportedStatus};
pub use runner::{PhaseOutcome, PhaseResult, PipelineReport, PipelineRunner, RunnerSettings};
