//! Exit threshold resolution
//!
//! Turns base profit-target / stop-loss percentages into the effective values
//! for one position, scaled by model confidence and by how much time is left
//! in the underlying event. The result is placed into an `ExitRuleConfig`
//! before the monitor ever sees it.

use precog_domain::ExitRuleConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Model confidence tier of the originating signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

/// Threshold multiplier per confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceMultipliers {
    pub low: Decimal,
    pub medium: Decimal,
    pub high: Decimal,
}

impl ConfidenceMultipliers {
    fn for_tier(&self, tier: ConfidenceTier) -> Decimal {
        match tier {
            ConfidenceTier::Low => self.low,
            ConfidenceTier::Medium => self.medium,
            ConfidenceTier::High => self.high,
        }
    }
}

/// Applies `multiplier` when no more than `max_remaining` is left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBand {
    pub max_remaining: Duration,
    pub multiplier: Decimal,
}

/// Effective thresholds for one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedThresholds {
    pub profit_target: Decimal,
    pub stop_loss: Decimal,
}

impl ResolvedThresholds {
    /// Place the thresholds into a rule set
    pub fn apply_to(self, rules: ExitRuleConfig) -> ExitRuleConfig {
        ExitRuleConfig {
            profit_target: self.profit_target,
            stop_loss: self.stop_loss,
            ..rules
        }
    }
}

/// Base thresholds plus their scaling tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitThresholdTable {
    pub base_profit_target: Decimal,
    /// Positive magnitude
    pub base_stop_loss: Decimal,
    pub confidence: ConfidenceMultipliers,
    /// Any order; the tightest matching band applies
    pub time_bands: Vec<TimeBand>,
}

impl Default for ExitThresholdTable {
    fn default() -> Self {
        Self {
            base_profit_target: dec!(0.20),
            base_stop_loss: dec!(0.15),
            confidence: ConfidenceMultipliers {
                low: dec!(0.75),
                medium: dec!(1.0),
                high: dec!(1.25),
            },
            time_bands: vec![
                TimeBand {
                    max_remaining: Duration::from_secs(5 * 60),
                    multiplier: dec!(0.5),
                },
                TimeBand {
                    max_remaining: Duration::from_secs(15 * 60),
                    multiplier: dec!(0.75),
                },
            ],
        }
    }
}

impl ExitThresholdTable {
    /// Resolve effective thresholds
    ///
    /// `time_remaining` of `None` (event time unknown) applies no time band.
    ///
    /// # Errors
    /// - `EngineError::InvariantViolation` if a multiplier is not positive
    /// - `EngineError::Arithmetic` on decimal overflow
    pub fn resolve(&self, tier: ConfidenceTier, time_remaining: Option<Duration>) -> EngineResult<ResolvedThresholds> {
        let confidence = self.confidence.for_tier(tier);
        if confidence <= Decimal::ZERO {
            return Err(EngineError::invariant(format!(
                "confidence multiplier for {:?} must be positive, got {}",
                tier, confidence
            )));
        }

        let time = match time_remaining {
            Some(remaining) => self
                .time_bands
                .iter()
                .filter(|band| remaining <= band.max_remaining)
                .min_by_key(|band| band.max_remaining)
                .map_or(Decimal::ONE, |band| band.multiplier),
            None => Decimal::ONE,
        };
        if time <= Decimal::ZERO {
            return Err(EngineError::invariant(format!("time band multiplier must be positive, got {}", time)));
        }

        let scale = |base: Decimal| {
            base.checked_mul(confidence)
                .and_then(|v| v.checked_mul(time))
                .map(|v| v.normalize())
                .ok_or_else(|| EngineError::arithmetic(format!("threshold overflow scaling {}", base)))
        };

        Ok(ResolvedThresholds {
            profit_target: scale(self.base_profit_target)?,
            stop_loss: scale(self.base_stop_loss)?,
        })
    }
}
