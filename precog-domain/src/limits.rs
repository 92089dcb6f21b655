//! Risk Limits and Open Proposals
//!
//! Per-user limits are immutable snapshots handed to the Risk Gate for each
//! call. Exposure aggregates are computed by the exposure collaborator, not
//! here.

use crate::value_objects::{DomainError, EventId, Sport, Ticker};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// RiskLimits
// =============================================================================

/// Per-user risk limits in dollars
///
/// Loss limits are magnitudes. A negative configured loss limit is read by
/// its absolute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_size_dollars: Decimal,
    pub max_total_exposure_dollars: Decimal,
    /// Per-sport caps; sports not listed use `default_sport_exposure_dollars`
    pub max_exposure_per_sport_dollars: BTreeMap<Sport, Decimal>,
    pub default_sport_exposure_dollars: Decimal,
    pub max_exposure_per_event_dollars: Decimal,
    pub max_correlated_exposure_dollars: Decimal,
    pub max_daily_loss_dollars: Decimal,
    pub max_weekly_loss_dollars: Decimal,
    pub max_loss_per_position_dollars: Decimal,
}

impl RiskLimits {
    /// Exposure cap for a sport, falling back to the default
    pub fn sport_limit(&self, sport: Option<&Sport>) -> Decimal {
        sport
            .and_then(|s| self.max_exposure_per_sport_dollars.get(s))
            .copied()
            .unwrap_or(self.default_sport_exposure_dollars)
    }

    /// Daily loss threshold as a non-positive P&L value
    pub fn daily_loss_floor(&self) -> Decimal {
        -self.max_daily_loss_dollars.abs()
    }

    /// Weekly loss threshold as a non-positive P&L value
    pub fn weekly_loss_floor(&self) -> Decimal {
        -self.max_weekly_loss_dollars.abs()
    }

    /// Validate the limits
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRiskLimits` if any exposure cap is negative.
    pub fn validate(&self) -> Result<(), DomainError> {
        let caps = [
            ("max_position_size_dollars", self.max_position_size_dollars),
            ("max_total_exposure_dollars", self.max_total_exposure_dollars),
            ("default_sport_exposure_dollars", self.default_sport_exposure_dollars),
            ("max_exposure_per_event_dollars", self.max_exposure_per_event_dollars),
            ("max_correlated_exposure_dollars", self.max_correlated_exposure_dollars),
            ("max_loss_per_position_dollars", self.max_loss_per_position_dollars),
        ];
        for (name, value) in caps {
            if value < Decimal::ZERO {
                return Err(DomainError::InvalidRiskLimits(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }

        for (sport, value) in &self.max_exposure_per_sport_dollars {
            if *value < Decimal::ZERO {
                return Err(DomainError::InvalidRiskLimits(format!(
                    "sport limit for {} must be non-negative, got {}",
                    sport, value
                )));
            }
        }

        Ok(())
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size_dollars: dec!(1000),
            max_total_exposure_dollars: dec!(10000),
            max_exposure_per_sport_dollars: BTreeMap::new(),
            default_sport_exposure_dollars: dec!(5000),
            max_exposure_per_event_dollars: dec!(2000),
            max_correlated_exposure_dollars: dec!(3000),
            max_daily_loss_dollars: dec!(500),
            max_weekly_loss_dollars: dec!(1500),
            max_loss_per_position_dollars: dec!(1000),
        }
    }
}

// =============================================================================
// Proposal / Exposure
// =============================================================================

/// A proposed new position awaiting the Risk Gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenProposal {
    /// Dollar size of the proposed position
    pub size: Decimal,
    pub sport: Option<Sport>,
    pub event_id: EventId,
    pub ticker: Ticker,
}

/// Pre-aggregated exposure for the proposing user
///
/// Realized P&L values are signed: losses are negative.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub total: Decimal,
    pub sport: Decimal,
    pub event: Decimal,
    pub correlated: Decimal,
    pub daily_realized_pnl: Decimal,
    pub weekly_realized_pnl: Decimal,
}

// =============================================================================
// Tests
// =============================================================================
