//! Mastery State - resumable pipeline bookkeeping
//!
//! This crate records what the pipeline has already done so that an
//! interrupted run can resume without redoing completed work:
//! - Status: the shared lifecycle enum for tasks, crew runs and phases
//! - Record: row types returned by the store
//! - Store: SQLite persistence (tasks, crew_runs, phases)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod record;
pub mod status;
pub mod store;

pub use error::{Error, Result};
pub use record::{CrewRunRecord, PhaseRecord, StateSummary, TaskRecord, TaskUpdate};
pub use status::Status;
pub use store::StateStore;
