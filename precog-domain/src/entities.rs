//! Domain Entities for Precog
//!
//! `Position` is an immutable snapshot: every lifecycle transition returns a
//! new value and persisting it is the caller's job.

use crate::exit_rules::TrailingStopConfig;
use crate::trailing::TrailingStopState;
use crate::value_objects::{DomainError, Price, Side, Ticker};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a Position
pub type PositionId = Uuid;

/// Unique identifier for a User (position owner)
pub type UserId = Uuid;

// =============================================================================
// Position
// =============================================================================

/// A single holding in one binary market for one user
///
/// Created when an accepted trade fills. The engine only ever returns new
/// snapshots of it; closing is recorded by the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    /// Owning user (a position without one is a data-consistency error)
    pub user_id: Option<UserId>,
    /// Opaque reference to the originating strategy version
    pub strategy_version_id: String,
    /// Opaque reference to the originating model version
    pub model_version_id: String,
    pub ticker: Ticker,
    pub side: Side,
    /// Signed contract count
    pub quantity: i64,
    pub entry_price: Price,
    pub entry_time: DateTime<Utc>,
    pub status: PositionStatus,
    /// Absent unless the owning strategy enables trailing stops
    pub trailing_stop: Option<TrailingStopState>,
    /// Number of partial-exit tiers already emitted
    pub partial_exits_taken: u32,
}

/// Parameters for opening a position from a fill
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub user_id: UserId,
    pub strategy_version_id: String,
    pub model_version_id: String,
    pub ticker: Ticker,
    pub side: Side,
    pub quantity: i64,
    pub entry_price: Price,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    /// Create an open position from a fill
    ///
    /// When `trailing` is given the position carries an inactive trailing
    /// stop armed at the configured activation threshold.
    pub fn open(params: OpenPosition, trailing: Option<&TrailingStopConfig>) -> Self {
        let trailing_stop = trailing
            .map(|cfg| TrailingStopState::inactive(cfg.activation_threshold, params.entry_time));

        Self {
            id: Uuid::now_v7(),
            user_id: Some(params.user_id),
            strategy_version_id: params.strategy_version_id,
            model_version_id: params.model_version_id,
            ticker: params.ticker,
            side: params.side,
            quantity: params.quantity,
            entry_price: params.entry_price,
            entry_time: params.entry_time,
            status: PositionStatus::Open,
            trailing_stop,
            partial_exits_taken: 0,
        }
    }

    /// Check if position is open
    pub fn is_open(&self) -> bool {
        matches!(self.status, PositionStatus::Open)
    }

    /// Check if position is closed
    pub fn is_closed(&self) -> bool {
        matches!(self.status, PositionStatus::Closed { .. })
    }

    /// Contract count regardless of sign
    pub fn contracts(&self) -> Decimal {
        Decimal::from(self.quantity.unsigned_abs())
    }

    /// Capital committed at entry
    ///
    /// Prices are quoted in YES terms, so a NO contract bought at `p` costs
    /// `1 − p`.
    pub fn notional(&self) -> Decimal {
        let cost = match self.side {
            Side::Yes => self.entry_price.as_decimal(),
            Side::No => (Decimal::ONE - self.entry_price.as_decimal()).max(Decimal::ZERO),
        };
        cost * self.contracts()
    }

    /// Sign-normalized favorable move since entry, as a fraction of entry price
    pub fn favorable_gain(&self, current: Price) -> Option<Decimal> {
        self.side.favorable_gain(self.entry_price, current)
    }

    /// Unrealized P&L in dollars at `current`
    pub fn unrealized_pnl(&self, current: Price) -> Decimal {
        pnl(self.side, self.entry_price, current, self.contracts())
    }

    /// Record the exit and realize P&L
    ///
    /// # Errors
    /// Returns `DomainError::InvalidStateTransition` if already closed.
    pub fn close(&self, exit_price: Price, exit_time: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.is_closed() {
            return Err(DomainError::InvalidStateTransition(format!(
                "position {} is already closed",
                self.id
            )));
        }

        let mut closed = self.clone();
        closed.status = PositionStatus::Closed {
            exit_price,
            exit_time,
            realized_pnl: pnl(self.side, self.entry_price, exit_price, self.contracts()),
        };
        Ok(closed)
    }

    /// Current trailing stop price, if the trail is active
    pub fn trailing_stop_price(&self) -> Option<Price> {
        self.trailing_stop.as_ref().and_then(TrailingStopState::current_stop_price)
    }
}

fn pnl(side: Side, entry: Price, exit: Price, contracts: Decimal) -> Decimal {
    match side {
        Side::Yes => (exit.as_decimal() - entry.as_decimal()) * contracts,
        Side::No => (entry.as_decimal() - exit.as_decimal()) * contracts,
    }
}

// =============================================================================
// Position Status
// =============================================================================

/// Lifecycle status; exit data exists only once closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PositionStatus {
    /// Position is live and monitored
    Open,

    /// Position exited, P&L realized
    Closed {
        exit_price: Price,
        exit_time: DateTime<Utc>,
        realized_pnl: Decimal,
    },
}

impl PositionStatus {
    /// Get the name of the status for display
    pub fn name(&self) -> &str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed { .. } => "closed",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_params(side: Side, quantity: i64) -> OpenPosition {
        OpenPosition {
            user_id: Uuid::now_v7(),
            strategy_version_id: "halftime_entry:v1.2".to_string(),
            model_version_id: "elo_nfl:v3".to_string(),
            ticker: Ticker::new("KXNFLGAME-25NOV16KCBUF-KC").unwrap(),
            side,
            quantity,
            entry_price: Price::new(dec!(0.50)).unwrap(),
            entry_time: Utc::now(),
        }
    }

    #[test]
    fn test_open_without_trailing() {
        let position = Position::open(open_params(Side::Yes, 100), None);

        assert!(position.is_open());
        assert!(position.trailing_stop.is_none());
        assert_eq!(position.partial_exits_taken, 0);
        assert_eq!(position.status.name(), "open");
    }

    #[test]
    fn test_open_with_trailing_starts_inactive() {
        let config = TrailingStopConfig::default();
        let position = Position::open(open_params(Side::Yes, 100), Some(&config));

        let trailing = position.trailing_stop.as_ref().unwrap();
        assert!(!trailing.is_activated());
        assert_eq!(trailing.activation_threshold, config.activation_threshold);
        assert!(position.trailing_stop_price().is_none());
    }

    #[test]
    fn test_notional_uses_absolute_quantity() {
        let position = Position::open(open_params(Side::Yes, -40), None);
        assert_eq!(position.notional(), dec!(20));
    }

    #[test]
    fn test_notional_no_side_is_complement_cost() {
        let mut params = open_params(Side::No, 100);
        params.entry_price = Price::new(dec!(0.80)).unwrap();
        let position = Position::open(params, None);

        assert_eq!(position.notional(), dec!(20));
        // Matches the worst case: price settles at 1
        assert_eq!(-position.unrealized_pnl(Price::new(dec!(1)).unwrap()), position.notional());
    }

    #[test]
    fn test_close_yes_profit() {
        let position = Position::open(open_params(Side::Yes, 100), None);
        let closed = position.close(Price::new(dec!(0.62)).unwrap(), Utc::now()).unwrap();

        match closed.status {
            PositionStatus::Closed { realized_pnl, exit_price, .. } => {
                assert_eq!(realized_pnl, dec!(12));
                assert_eq!(exit_price.as_decimal(), dec!(0.62));
            },
            PositionStatus::Open => panic!("expected closed"),
        }
        // Original snapshot untouched
        assert!(position.is_open());
    }

    #[test]
    fn test_close_no_side_profit_when_price_falls() {
        let position = Position::open(open_params(Side::No, 100), None);
        let closed = position.close(Price::new(dec!(0.40)).unwrap(), Utc::now()).unwrap();

        assert!(matches!(
            closed.status,
            PositionStatus::Closed { realized_pnl, .. } if realized_pnl == dec!(10)
        ));
    }

    #[test]
    fn test_close_twice_is_invalid() {
        let position = Position::open(open_params(Side::Yes, 10), None);
        let closed = position.close(Price::new(dec!(0.55)).unwrap(), Utc::now()).unwrap();

        let err = closed.close(Price::new(dec!(0.60)).unwrap(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
    }

    #[test]
    fn test_unrealized_pnl() {
        let position = Position::open(open_params(Side::Yes, 200), None);
        assert_eq!(position.unrealized_pnl(Price::new(dec!(0.45)).unwrap()), dec!(-10));
    }
}
