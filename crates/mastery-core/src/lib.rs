//! Mastery Core - phase sequencing
//!
//! This crate drives the pipeline:
//! - Pipeline: phase catalog, runner and the crew executor contract
//! - Artifacts: checks on the documents crews write

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod artifacts;
pub mod error;
pub mod pipeline;

pub use artifacts::{artifact_is_complete, list_artifacts, ArtifactInfo, MIN_ARTIFACT_BYTES};
pub use error::{Error, Result};
pub use pipeline::{
    default_catalog, AgentSpec, CrewExecutor, CrewKickoff, CrewMessage, FailurePolicy,
    PhaseOutcome, PhaseResult, PhaseSpec, PipelineReport, PipelineRunner, ProcessExecutor,
    ReportedStatus, RunnerSettings, TaskOutcome, TaskResult, TaskSpec,
};
