//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! Thread-safe using tokio RwLock for concurrent access.

use crate::error::StoreError;
use crate::repository::{EventRepository, PositionRepository, Store};
use async_trait::async_trait;
use precog_domain::{Event, Position, PositionId, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory store for testing
pub struct MemoryStore {
    positions: RwLock<HashMap<PositionId, Position>>,
    events: RwLock<Vec<StoredEvent>>,
    event_seq: AtomicI64,
}

/// Event with sequence number
struct StoredEvent {
    seq: i64,
    event: Event,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
            event_seq: AtomicI64::new(0),
        }
    }

    /// Get the number of positions
    pub async fn position_count(&self) -> usize {
        self.positions.read().await.len()
    }

    /// Get the number of events
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// All events in append order
    pub async fn all_events(&self) -> Vec<Event> {
        self.events.read().await.iter().map(|e| e.event.clone()).collect()
    }

    /// Clear all data (useful for test setup)
    pub async fn clear(&self) {
        self.positions.write().await.clear();
        self.events.write().await.clear();
        self.event_seq.store(0, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Position Repository Implementation
// =============================================================================

#[async_trait]
impl PositionRepository for MemoryStore {
    async fn save(&self, position: &Position) -> Result<(), StoreError> {
        let mut positions = self.positions.write().await;

        if let Some(existing) = positions.get(&position.id) {
            if existing.is_closed() && position.is_open() {
                return Err(StoreError::invalid_state(format!(
                    "position {} is closed and cannot be reopened",
                    position.id
                )));
            }
        }

        debug!(position_id = %position.id, status = position.status.name(), "Position saved");
        positions.insert(position.id, position.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PositionId) -> Result<Option<Position>, StoreError> {
        let positions = self.positions.read().await;
        Ok(positions.get(&id).cloned())
    }

    async fn find_open(&self) -> Result<Vec<Position>, StoreError> {
        let positions = self.positions.read().await;
        let mut open: Vec<Position> = positions.values().filter(|p| p.is_open()).cloned().collect();
        // v7 ids sort by creation time
        open.sort_by_key(|p| p.id);
        Ok(open)
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Position>, StoreError> {
        let positions = self.positions.read().await;
        let mut owned: Vec<Position> = positions
            .values()
            .filter(|p| p.user_id == Some(user_id))
            .cloned()
            .collect();
        owned.sort_by_key(|p| p.id);
        Ok(owned)
    }
}

// =============================================================================
// Event Repository Implementation
// =============================================================================

#[async_trait]
impl EventRepository for MemoryStore {
    async fn append(&self, event: &Event) -> Result<i64, StoreError> {
        let mut events = self.events.write().await;
        let seq = self.event_seq.fetch_add(1, Ordering::SeqCst) + 1;
        events.push(StoredEvent {
            seq,
            event: event.clone(),
        });
        Ok(seq)
    }

    async fn find_by_position(&self, position_id: PositionId) -> Result<Vec<Event>, StoreError> {
        let events = self.events.read().await;
        let mut found: Vec<&StoredEvent> = events
            .iter()
            .filter(|e| e.event.position_id() == Some(position_id))
            .collect();
        found.sort_by_key(|e| e.seq);
        Ok(found.into_iter().map(|e| e.event.clone()).collect())
    }
}

// =============================================================================
// Store Implementation
// =============================================================================

impl Store for MemoryStore {
    fn positions(&self) -> &dyn PositionRepository {
        self
    }

    fn events(&self) -> &dyn EventRepository {
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
