//! Trailing Stop State and Pure Functions
//!
//! This module contains the per-position trailing stop state and the pure
//! arithmetic the tracker is built from. All functions are deterministic and
//! have no side effects.
//!
//! # Trailing Stop Algorithm (Tightening Percentage Trail)
//!
//! Once the favorable move reaches the activation threshold the trail arms:
//! - YES: Stop = peak × (1 − distance)
//! - NO:  Stop = low × (1 + distance)
//!
//! The distance starts at the configured base and tightens by `tighten_rate`
//! for every `tighten_step` of favorable move beyond activation, never below
//! the configured minimum.
//!
//! Key invariants:
//! - Stop is monotonic (never moves against us)
//! - Favorable extreme is monotonic (peak only rises, low only falls)
//! - Activation is terminal

use crate::exit_rules::TrailingStopConfig;
use crate::value_objects::{DomainError, Price, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// State
// =============================================================================

/// Per-position trailing stop state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopState {
    /// Favorable-move fraction required to arm the trail (0.10 = +10%)
    pub activation_threshold: Decimal,
    /// Inactive or active with a locked-in stop
    pub phase: TrailingPhase,
    /// Timestamp of the last applied price observation
    pub last_updated: DateTime<Utc>,
}

/// Trailing stop phase
///
/// There is no transition from `Active` back to `Inactive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TrailingPhase {
    /// Activation threshold not yet reached; no stop price has meaning
    Inactive,

    /// Trail armed
    Active {
        /// Most favorable price since activation (highest for YES, lowest for NO)
        peak_price_seen: Price,
        /// Price at which, if crossed adversely, the position must exit
        current_stop_price: Price,
        /// When the trail armed
        activated_at: DateTime<Utc>,
    },
}

impl TrailingStopState {
    /// Create an inactive trailing stop
    pub fn inactive(activation_threshold: Decimal, created_at: DateTime<Utc>) -> Self {
        Self {
            activation_threshold,
            phase: TrailingPhase::Inactive,
            last_updated: created_at,
        }
    }

    /// Whether the trail has armed
    pub fn is_activated(&self) -> bool {
        matches!(self.phase, TrailingPhase::Active { .. })
    }

    /// Peak favorable price, `None` while inactive
    pub fn peak_price_seen(&self) -> Option<Price> {
        match self.phase {
            TrailingPhase::Active { peak_price_seen, .. } => Some(peak_price_seen),
            TrailingPhase::Inactive => None,
        }
    }

    /// Locked-in stop price, `None` while inactive
    pub fn current_stop_price(&self) -> Option<Price> {
        match self.phase {
            TrailingPhase::Active { current_stop_price, .. } => Some(current_stop_price),
            TrailingPhase::Inactive => None,
        }
    }
}

// =============================================================================
// Pure Functions
// =============================================================================

/// Effective trailing distance for a given favorable gain
///
/// ```text
/// above    = gain - activation_threshold
/// distance = base - (above / tighten_step) * tighten_rate     (when above > 0)
/// distance = max(distance, min_trailing_distance)
/// ```
///
/// # Examples
///
/// ```
/// # use precog_domain::exit_rules::TrailingStopConfig;
/// # use precog_domain::trailing::effective_trailing_distance;
/// # use rust_decimal_macros::dec;
/// let config = TrailingStopConfig {
///     activation_threshold: dec!(0.10),
///     base_trailing_distance: dec!(0.05),
///     ..TrailingStopConfig::default()
/// };
///
/// // 10 points beyond activation: two steps of 0.01
/// assert_eq!(effective_trailing_distance(&config, dec!(0.20)), Some(dec!(0.03)));
///
/// // Far beyond activation: floored at 0.02
/// assert_eq!(effective_trailing_distance(&config, dec!(0.90)), Some(dec!(0.02)));
/// ```
///
/// Returns `None` on decimal overflow.
pub fn effective_trailing_distance(config: &TrailingStopConfig, gain: Decimal) -> Option<Decimal> {
    let above = gain.checked_sub(config.activation_threshold)?;
    let mut distance = config.base_trailing_distance;

    if above > Decimal::ZERO {
        let steps = above.checked_div(config.tighten_step)?;
        let tighten = steps.checked_mul(config.tighten_rate)?;
        distance = distance.checked_sub(tighten)?;
    }

    Some(distance.max(config.min_trailing_distance))
}

/// Stop price a given favorable extreme implies at `distance`
///
/// - YES: `extreme × (1 − distance)`
/// - NO:  `extreme × (1 + distance)`
///
/// # Errors
/// Returns `DomainError::InvalidPrice` if the result is not a positive price.
pub fn stop_from_extreme(side: Side, extreme: Price, distance: Decimal) -> Result<Price, DomainError> {
    let factor = match side {
        Side::Yes => Decimal::ONE - distance,
        Side::No => Decimal::ONE + distance,
    };
    let raw = extreme
        .as_decimal()
        .checked_mul(factor)
        .ok_or_else(|| DomainError::InvalidPrice(format!("overflow computing stop from {}", extreme)))?;
    Price::from_computed(raw)
}

/// Tighter of two stops (higher for YES, lower for NO)
///
/// This is the ratchet: the result is never looser than `current`.
pub fn ratchet_stop(side: Side, current: Price, candidate: Price) -> Price {
    match side {
        Side::Yes => current.max(candidate),
        Side::No => current.min(candidate),
    }
}

/// Check if trailing stop is hit (should exit)
///
/// Boundaries are inclusive: a price exactly at the stop counts as hit.
///
/// ```
/// # use precog_domain::trailing::is_trailing_stop_hit;
/// # use precog_domain::value_objects::{Price, Side};
/// # use rust_decimal_macros::dec;
/// let stop = Price::new(dec!(0.6305)).unwrap();
/// assert!(is_trailing_stop_hit(Side::Yes, Price::new(dec!(0.6305)).unwrap(), stop));
/// assert!(is_trailing_stop_hit(Side::Yes, Price::new(dec!(0.62)).unwrap(), stop));
/// assert!(!is_trailing_stop_hit(Side::Yes, Price::new(dec!(0.64)).unwrap(), stop));
/// assert!(is_trailing_stop_hit(Side::No, Price::new(dec!(0.64)).unwrap(), stop));
/// ```
pub fn is_trailing_stop_hit(side: Side, current_price: Price, trailing_stop: Price) -> bool {
    match side {
        Side::Yes => current_price <= trailing_stop,
        Side::No => current_price >= trailing_stop,
    }
}

/// Whether moving from `previous` to `next` loosens the stop
pub fn stop_loosened(side: Side, previous: Price, next: Price) -> bool {
    match side {
        Side::Yes => next < previous,
        Side::No => next > previous,
    }
}

// =============================================================================
// Tests
// =============================================================================
