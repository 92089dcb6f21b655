//! Market Data Types
//!
//! What the monitor sees of a market on one cycle. Predicates are evaluated
//! by the market-data collaborator; the engine only reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{Price, Ticker};

/// Externally evaluated conditions that drive monitoring cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitoringPredicates {
    /// Late in the game and the score is close
    pub late_and_close: bool,
    /// Market price moved sharply since the last cycle
    pub large_swing: bool,
    /// Book is thin or spread is wide
    pub thin_spread: bool,
    /// Model edge is small but not yet past the exit threshold
    pub low_edge: bool,
    /// Underlying game is not live
    pub no_live_game: bool,
}

/// Point-in-time market observation for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: Ticker,
    /// Current price in YES terms
    pub price: Price,
    /// Model edge (model probability minus market price), if available
    pub edge: Option<Decimal>,
    /// When the price was observed
    pub observed_at: DateTime<Utc>,
    pub predicates: MonitoringPredicates,
}

impl MarketSnapshot {
    /// Snapshot with no edge and no predicates set
    pub fn new(ticker: Ticker, price: Price, observed_at: DateTime<Utc>) -> Self {
        Self {
            ticker,
            price,
            edge: None,
            observed_at,
            predicates: MonitoringPredicates::default(),
        }
    }

    /// Set the model edge
    pub fn with_edge(mut self, edge: Decimal) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Set the monitoring predicates
    pub fn with_predicates(mut self, predicates: MonitoringPredicates) -> Self {
        self.predicates = predicates;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_builder() {
        let snapshot = MarketSnapshot::new(
            Ticker::new("KXNBAGAME-25DEC01LALBOS-LAL").unwrap(),
            Price::new(dec!(0.42)).unwrap(),
            Utc::now(),
        )
        .with_edge(dec!(0.03))
        .with_predicates(MonitoringPredicates {
            thin_spread: true,
            ..MonitoringPredicates::default()
        });

        assert_eq!(snapshot.edge, Some(dec!(0.03)));
        assert!(snapshot.predicates.thin_spread);
        assert!(!snapshot.predicates.late_and_close);
    }
}
