//! Error types for mastery-core

use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum Error {
    /// State store failure
    #[error("state store error: {0}")]
    State(#[from] mastery_state::Error),

    /// LLM governance failure
    #[error("llm governor error: {0}")]
    Llm(#[from] mastery_llm::Error),

    /// Crew execution failed
    #[error("crew execution failed: {0}")]
    Execution(String),

    /// No phase with this number
    #[error("unknown phase: {0}")]
    UnknownPhase(u32),

    /// The pipeline was interrupted
    #[error("pipeline cancelled")]
    Cancelled,

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from an interruption rather than a fault
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Error::Cancelled | Error::Llm(mastery_llm::Error::WaitInterrupted)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
