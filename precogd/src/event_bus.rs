//! Event bus for internal daemon communication.
//!
//! The event bus allows decoupled communication between:
//! - Position workers → observers (emitted actions, degraded evaluations)
//! - Risk Gate admissions → observers (open decisions)
//! - Daemon → everyone (shutdown)
//!
//! Uses tokio broadcast channels for fan-out to multiple receivers.

use chrono::{DateTime, Utc};
use precog_domain::{PositionAction, PositionId, Price, Ticker, UserId};
use tokio::sync::broadcast;

use crate::worker::WorkerExit;

// =============================================================================
// Event Types
// =============================================================================

/// Events that flow through the daemon event bus.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    /// A worker recommended a non-hold action
    ActionEmitted {
        position_id: PositionId,
        action: PositionAction,
        price: Price,
        timestamp: DateTime<Utc>,
    },

    /// An evaluation degraded to hold
    EvaluationDegraded {
        position_id: PositionId,
        alert: String,
        timestamp: DateTime<Utc>,
    },

    /// Risk Gate decided on a proposed open
    OpenDecided(OpenDecision),

    /// A position worker started
    WorkerStarted { position_id: PositionId },

    /// A position worker stopped
    WorkerStopped { position_id: PositionId, exit: WorkerExit },

    /// Shutdown signal
    Shutdown,
}

/// Outcome of a proposed open, as published on the bus.
#[derive(Debug, Clone)]
pub struct OpenDecision {
    pub user_id: UserId,
    pub ticker: Ticker,
    pub admitted: bool,
    /// Failed check number, when rejected
    pub check: Option<u8>,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Event Bus
// =============================================================================

/// Event bus for daemon-wide communication.
///
/// Multiple producers can send events, and multiple consumers can receive.
/// Uses broadcast channels for fan-out pattern.
pub struct EventBus {
    sender: broadcast::Sender<DaemonEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity.
    ///
    /// Capacity determines how many events can be buffered before
    /// slow receivers start missing events (lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// Returns 0 if there are no active receivers.
    pub fn send(&self, event: DaemonEvent) -> usize {
        // send() returns Err if there are no receivers, but we don't care
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events.
    ///
    /// Returns a receiver that will receive all events sent after subscription.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Receiver for daemon events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<DaemonEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the sender has been dropped.
    /// Returns error description if the receiver lagged (missed events).
    pub async fn recv(&mut self) -> Option<Result<DaemonEvent, String>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<DaemonEvent, String>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
