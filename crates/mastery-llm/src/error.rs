//! Error types for mastery-llm

use thiserror::Error;

/// LLM governance error type
#[derive(Debug, Error)]
pub enum Error {
    /// No configured provider serves the model
    #[error("no provider configured for model: {0}")]
    UnknownProvider(String),

    /// Provider is known but its credentials are missing
    #[error("provider {provider} is not configured: {reason}")]
    NotConfigured {
        /// Provider name
        provider: String,
        /// What is missing
        reason: String,
    },

    /// A rate-limit wait was cancelled before it finished
    #[error("rate limit wait interrupted")]
    WaitInterrupted,

    /// A ledger line could not be parsed
    #[error("ledger parse error at line {line}: {message}")]
    LedgerParse {
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },

    /// Ledger file I/O failed
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The LLM backend returned an error
    #[error("api error: {0}")]
    Api(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
