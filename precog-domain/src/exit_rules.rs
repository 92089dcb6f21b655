//! Exit Rule Configuration
//!
//! Strongly-typed, already-resolved thresholds for one position. The
//! configuration collaborator resolves strategy overrides into these values
//! once; the engine never looks rules up by strategy name.

use crate::value_objects::{validate_unit_fraction, DomainError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Trailing Stop
// =============================================================================

/// Trailing stop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailingStopConfig {
    /// Favorable-move fraction that arms the trail (0.10 = +10%)
    pub activation_threshold: Decimal,
    /// Starting trail distance as a fraction of the peak (0.05 = 5%)
    pub base_trailing_distance: Decimal,
    /// Distance removed per `tighten_step` of move beyond activation
    pub tighten_rate: Decimal,
    /// Size of one tightening step (0.05 = every 5 points)
    pub tighten_step: Decimal,
    /// Distance floor
    pub min_trailing_distance: Decimal,
}

impl TrailingStopConfig {
    /// Default distance floor (2%)
    pub const DEFAULT_MIN_DISTANCE: Decimal = dec!(0.02);

    /// Whether every computed distance is clamped up to the minimum
    pub fn min_exceeds_base(&self) -> bool {
        self.min_trailing_distance > self.base_trailing_distance
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `DomainError::InvalidExitRules` if:
    /// - activation threshold outside [0, 1)
    /// - base distance outside (0, 1)
    /// - min distance negative or above base
    /// - tighten rate negative or step not positive
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.activation_threshold < Decimal::ZERO || self.activation_threshold >= Decimal::ONE {
            return Err(DomainError::InvalidExitRules(format!(
                "activation threshold must be in [0, 1), got {}",
                self.activation_threshold
            )));
        }
        if self.base_trailing_distance <= Decimal::ZERO || self.base_trailing_distance >= Decimal::ONE {
            return Err(DomainError::InvalidExitRules(format!(
                "base trailing distance must be in (0, 1), got {}",
                self.base_trailing_distance
            )));
        }
        if self.min_trailing_distance < Decimal::ZERO {
            return Err(DomainError::InvalidExitRules(format!(
                "min trailing distance must be non-negative, got {}",
                self.min_trailing_distance
            )));
        }
        if self.min_trailing_distance > self.base_trailing_distance {
            return Err(DomainError::InvalidExitRules(format!(
                "min trailing distance {} above base distance {}",
                self.min_trailing_distance, self.base_trailing_distance
            )));
        }
        if self.tighten_rate < Decimal::ZERO {
            return Err(DomainError::InvalidExitRules(format!(
                "tighten rate must be non-negative, got {}",
                self.tighten_rate
            )));
        }
        if self.tighten_step <= Decimal::ZERO {
            return Err(DomainError::InvalidExitRules(format!(
                "tighten step must be positive, got {}",
                self.tighten_step
            )));
        }
        Ok(())
    }
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        Self {
            activation_threshold: dec!(0.10),
            base_trailing_distance: dec!(0.05),
            tighten_rate: dec!(0.01),
            tighten_step: dec!(0.05),
            min_trailing_distance: Self::DEFAULT_MIN_DISTANCE,
        }
    }
}

// =============================================================================
// Partial Exits / Scaling
// =============================================================================

/// One partial-exit tier: at `trigger_gain`, exit `exit_fraction` of the position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialExitTier {
    pub trigger_gain: Decimal,
    pub exit_fraction: Decimal,
}

/// Edge-driven scale in/out (disabled unless configured)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Edge at or above which to add to a non-losing position
    pub scale_in_edge: Decimal,
    pub add_fraction: Decimal,
    /// Edge at or below which to trim the position
    pub scale_out_edge: Decimal,
    pub reduce_fraction: Decimal,
}

// =============================================================================
// Exit Rules
// =============================================================================

/// Resolved exit thresholds for one position
///
/// `stop_loss` is a positive magnitude: the stop fires at `gain <= -stop_loss`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRuleConfig {
    /// Effective profit target as a fraction of entry (0.20 = +20%)
    pub profit_target: Decimal,
    /// Effective stop loss magnitude (0.15 = -15%)
    pub stop_loss: Decimal,
    /// Edge below which the position exits early
    pub early_exit_edge: Decimal,
    pub trailing_stop: Option<TrailingStopConfig>,
    /// Ascending by trigger
    pub partial_exits: Vec<PartialExitTier>,
    pub scaling: Option<ScalingConfig>,
}

impl ExitRuleConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `DomainError::InvalidExitRules` on any inconsistent threshold.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.profit_target <= Decimal::ZERO {
            return Err(DomainError::InvalidExitRules(format!(
                "profit target must be positive, got {}",
                self.profit_target
            )));
        }
        if self.stop_loss <= Decimal::ZERO {
            return Err(DomainError::InvalidExitRules(format!(
                "stop loss must be a positive magnitude, got {}",
                self.stop_loss
            )));
        }

        if let Some(trailing) = &self.trailing_stop {
            trailing.validate()?;
        }

        let mut previous: Option<Decimal> = None;
        for tier in &self.partial_exits {
            validate_unit_fraction("partial exit fraction", tier.exit_fraction)
                .map_err(|e| DomainError::InvalidExitRules(e.to_string()))?;
            if tier.trigger_gain <= Decimal::ZERO || tier.trigger_gain >= self.profit_target {
                return Err(DomainError::InvalidExitRules(format!(
                    "partial exit trigger {} must be in (0, profit target {})",
                    tier.trigger_gain, self.profit_target
                )));
            }
            if previous.is_some_and(|p| tier.trigger_gain <= p) {
                return Err(DomainError::InvalidExitRules(
                    "partial exit tiers must be strictly ascending".to_string(),
                ));
            }
            previous = Some(tier.trigger_gain);
        }

        if let Some(scaling) = &self.scaling {
            validate_unit_fraction("add fraction", scaling.add_fraction)
                .map_err(|e| DomainError::InvalidExitRules(e.to_string()))?;
            validate_unit_fraction("reduce fraction", scaling.reduce_fraction)
                .map_err(|e| DomainError::InvalidExitRules(e.to_string()))?;
            if scaling.scale_out_edge >= scaling.scale_in_edge {
                return Err(DomainError::InvalidExitRules(format!(
                    "scale-out edge {} must be below scale-in edge {}",
                    scaling.scale_out_edge, scaling.scale_in_edge
                )));
            }
        }

        Ok(())
    }
}

impl Default for ExitRuleConfig {
    fn default() -> Self {
        Self {
            profit_target: dec!(0.20),
            stop_loss: dec!(0.15),
            early_exit_edge: dec!(0.02),
            trailing_stop: None,
            partial_exits: Vec::new(),
            scaling: None,
        }
    }
}

// =============================================================================
// Cadence
// =============================================================================

/// Monitoring interval bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceConfig {
    pub critical: Duration,
    pub default: Duration,
    pub slow: Duration,
    /// |gain| at or above which a position counts as swinging
    pub swing_threshold: Decimal,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            critical: Duration::from_secs(15),
            default: Duration::from_secs(60),
            slow: Duration::from_secs(120),
            swing_threshold: dec!(0.10),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
