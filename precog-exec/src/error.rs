//! Collaborator port error types.

use thiserror::Error;

/// Errors that can occur talking to external collaborators.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Market data unavailable for a ticker
    #[error("Market data error: {0}")]
    MarketData(String),

    /// Execution collaborator refused or failed a submission
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Exposure aggregation failed
    #[error("Exposure error: {0}")]
    Exposure(String),

    /// Configuration missing or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] precog_domain::DomainError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] precog_engine::EngineError),
}

/// Result type for collaborator operations.
pub type ExecResult<T> = Result<T, ExecError>;
