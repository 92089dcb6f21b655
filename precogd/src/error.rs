//! Daemon error types.

use precog_domain::DomainError;
use precog_engine::EngineError;
use precog_exec::ExecError;
use precog_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Collaborator error
    #[error("Collaborator error: {0}")]
    Exec(#[from] ExecError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Position not found
    #[error("Position not found: {0}")]
    PositionNotFound(Uuid),

    /// Position is already being monitored
    #[error("Position already monitored: {0}")]
    PositionAlreadyMonitored(Uuid),

    /// Worker inbox closed (worker finished or crashed)
    #[error("Worker for position {0} is no longer running")]
    WorkerClosed(Uuid),

    /// Event bus error
    #[error("Event bus error: {0}")]
    EventBus(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
