//! Error types for mastery-state

use crate::status::Status;
use thiserror::Error;

/// State store error type
#[derive(Debug, Error)]
pub enum Error {
    /// The backing database could not be opened, read or written
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Crew run does not exist
    #[error("crew run not found: {0}")]
    RunNotFound(String),

    /// Crew run has already reached a terminal status
    #[error("crew run {run_id} already finished with status {status}")]
    RunAlreadyFinished {
        /// Run identifier
        run_id: String,
        /// Status the run finished with
        status: Status,
    },
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Database(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
