//! Domain Events for Precog
//!
//! Audit records of decisions the engine made. Appended by the daemon, never
//! replayed to rebuild state.

use crate::actions::PositionAction;
use crate::entities::{PositionId, UserId};
use crate::value_objects::{Price, Ticker};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Audit events for position monitoring and risk admission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Favorable move reached the activation threshold
    TrailingStopActivated {
        /// Position identifier
        position_id: PositionId,
        /// Price at activation (the first peak)
        peak_price: Price,
        /// Initial stop price
        stop_price: Price,
        /// Observation time
        timestamp: DateTime<Utc>,
    },

    /// Trailing stop tightened
    TrailingStopRaised {
        /// Position identifier
        position_id: PositionId,
        /// Previous stop price
        previous_stop: Price,
        /// New stop price
        new_stop: Price,
        /// Peak the new stop was computed from
        peak_price: Price,
        /// Observation time
        timestamp: DateTime<Utc>,
    },

    /// Monitor recommended a non-hold action
    ActionEmitted {
        /// Position identifier
        position_id: PositionId,
        /// The action
        action: PositionAction,
        /// Market price at evaluation
        price: Price,
        /// Observation time
        timestamp: DateTime<Utc>,
    },

    /// Risk Gate admitted a proposed position
    OpenAdmitted {
        /// Proposing user
        user_id: UserId,
        /// Market ticker
        ticker: Ticker,
        /// Proposed dollar size
        size: Decimal,
        /// Decision time
        timestamp: DateTime<Utc>,
    },

    /// Risk Gate rejected a proposed position
    OpenRejected {
        /// Proposing user
        user_id: UserId,
        /// Market ticker
        ticker: Ticker,
        /// Proposed dollar size
        size: Decimal,
        /// Number of the failed check
        check: u8,
        /// Rejection reason
        reason: String,
        /// Decision time
        timestamp: DateTime<Utc>,
    },

    /// Evaluation hit a hard fault and fell back to hold
    EvaluationDegraded {
        /// Position identifier
        position_id: PositionId,
        /// Alert text
        alert: String,
        /// Observation time
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// Position the event belongs to, if any
    pub fn position_id(&self) -> Option<PositionId> {
        match self {
            Event::TrailingStopActivated { position_id, .. }
            | Event::TrailingStopRaised { position_id, .. }
            | Event::ActionEmitted { position_id, .. }
            | Event::EvaluationDegraded { position_id, .. } => Some(*position_id),
            Event::OpenAdmitted { .. } | Event::OpenRejected { .. } => None,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::TrailingStopActivated { timestamp, .. }
            | Event::TrailingStopRaised { timestamp, .. }
            | Event::ActionEmitted { timestamp, .. }
            | Event::OpenAdmitted { timestamp, .. }
            | Event::OpenRejected { timestamp, .. }
            | Event::EvaluationDegraded { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::TrailingStopActivated { .. } => "trailing_stop_activated",
            Event::TrailingStopRaised { .. } => "trailing_stop_raised",
            Event::ActionEmitted { .. } => "action_emitted",
            Event::OpenAdmitted { .. } => "open_admitted",
            Event::OpenRejected { .. } => "open_rejected",
            Event::EvaluationDegraded { .. } => "evaluation_degraded",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
