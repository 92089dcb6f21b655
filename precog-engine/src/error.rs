//! Engine error types.
//!
//! Only hard faults are errors. Limit breaches, guard failures and
//! non-activation are ordinary values.

use chrono::{DateTime, Utc};
use precog_domain::DomainError;
use thiserror::Error;

/// Hard faults raised by engine computations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Decimal overflow or division by zero
    #[error("Arithmetic fault: {0}")]
    Arithmetic(String),

    /// A state invariant would have been broken
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Observation older than the last applied one
    #[error("Out-of-order observation at {observed_at}, last applied {last_updated}")]
    OutOfOrder {
        /// Timestamp of the rejected observation
        observed_at: DateTime<Utc>,
        /// Timestamp of the last applied observation
        last_updated: DateTime<Utc>,
    },

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Create an arithmetic fault
    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::Arithmetic(message.into())
    }

    /// Create an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
