//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (position, event)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Write would move a record backwards through its lifecycle
    #[error("Invalid state transition: {message}")]
    InvalidState {
        /// Description of the invalid transition
        message: String,
    },

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] precog_domain::DomainError),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
