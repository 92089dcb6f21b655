//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the daemon.
//! Implementations can be a database, in-memory, or mock for testing.

use crate::error::StoreError;
use async_trait::async_trait;
use precog_domain::{Event, Position, PositionId, UserId};

/// Repository for Position snapshots
#[async_trait]
pub trait PositionRepository: Send + Sync {
    /// Save a position snapshot (insert or replace)
    async fn save(&self, position: &Position) -> Result<(), StoreError>;

    /// Find a position by ID
    async fn find_by_id(&self, id: PositionId) -> Result<Option<Position>, StoreError>;

    /// Find all open positions
    async fn find_open(&self) -> Result<Vec<Position>, StoreError>;

    /// Find all positions owned by a user
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Position>, StoreError>;
}

/// Repository for audit events (append-only)
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append an event, returning its sequence number
    async fn append(&self, event: &Event) -> Result<i64, StoreError>;

    /// Load all events for a position (in append order)
    async fn find_by_position(&self, position_id: PositionId) -> Result<Vec<Event>, StoreError>;
}

/// Combined store interface
pub trait Store: Send + Sync {
    /// Get position repository
    fn positions(&self) -> &dyn PositionRepository;

    /// Get event repository
    fn events(&self) -> &dyn EventRepository;
}
