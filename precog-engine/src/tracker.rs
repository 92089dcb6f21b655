//! Trailing Stop Tracker
//!
//! Applies one price observation to a position's trailing stop state and
//! returns the new state. The state passed in is never modified.
//!
//! - Inactive: arms once the favorable move reaches the activation threshold,
//!   with the stop at the base distance from the activation price.
//! - Active: tracks the peak, tightens the distance with further profit and
//!   ratchets the stop. A price at or through the stop triggers.

use chrono::{DateTime, Utc};
use precog_domain::trailing::{
    effective_trailing_distance, is_trailing_stop_hit, ratchet_stop, stop_from_extreme, stop_loosened,
};
use precog_domain::{Price, Side, TrailingPhase, TrailingStopConfig, TrailingStopState};
use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Why the trailing stop fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerReason {
    /// Observed price
    pub price: Price,
    /// Stop price that was crossed
    pub stop: Price,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trailing stop hit: price {} crossed stop {}", self.price, self.stop)
    }
}

/// Result of applying one observation
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingUpdate {
    /// New state to persist
    pub state: TrailingStopState,
    /// Set when the observation crossed the stop
    pub trigger: Option<TriggerReason>,
    /// Distance used this cycle, `None` while inactive
    pub effective_distance: Option<Decimal>,
    /// The trail armed on this observation
    pub activated: bool,
    /// The stop tightened on this observation
    pub stop_raised: bool,
}

impl TrailingUpdate {
    pub fn is_triggered(&self) -> bool {
        self.trigger.is_some()
    }
}

/// Stateless trailing stop tracker for one configuration
#[derive(Debug, Clone)]
pub struct TrailingStopTracker {
    config: TrailingStopConfig,
}

impl TrailingStopTracker {
    /// Create a tracker
    ///
    /// A minimum distance above the base distance is tolerated: every
    /// computed distance is clamped up to the minimum. Callers flag such a
    /// configuration once, when they load it.
    pub fn new(config: TrailingStopConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrailingStopConfig {
        &self.config
    }

    /// Apply one price observation
    ///
    /// # Errors
    /// - `EngineError::OutOfOrder` if `observed_at` precedes the state's last update
    /// - `EngineError::Arithmetic` on decimal overflow
    /// - `EngineError::InvariantViolation` if the stop would loosen or the peak regress
    pub fn update(
        &self,
        state: &TrailingStopState,
        side: Side,
        entry_price: Price,
        current_price: Price,
        observed_at: DateTime<Utc>,
    ) -> EngineResult<TrailingUpdate> {
        if observed_at < state.last_updated {
            return Err(EngineError::OutOfOrder {
                observed_at,
                last_updated: state.last_updated,
            });
        }

        let gain = side.favorable_gain(entry_price, current_price).ok_or_else(|| {
            EngineError::arithmetic(format!("gain overflow at entry {} price {}", entry_price, current_price))
        })?;

        // Activation is owned by the state so a position keeps the threshold it opened with
        let config = TrailingStopConfig {
            activation_threshold: state.activation_threshold,
            ..self.config
        };

        match state.phase {
            TrailingPhase::Inactive => self.update_inactive(state, &config, side, current_price, gain, observed_at),
            TrailingPhase::Active {
                peak_price_seen,
                current_stop_price,
                activated_at,
            } => {
                let distance = effective_trailing_distance(&config, gain).ok_or_else(|| {
                    EngineError::arithmetic(format!("trailing distance overflow at gain {}", gain))
                })?;

                let peak = side.most_favorable(current_price, peak_price_seen);
                if side.is_more_favorable(peak_price_seen, peak) {
                    return Err(EngineError::invariant(format!(
                        "peak regressed from {} to {}",
                        peak_price_seen, peak
                    )));
                }

                let candidate = stop_from_extreme(side, peak, distance)?;
                let stop = ratchet_stop(side, current_stop_price, candidate);
                if stop_loosened(side, current_stop_price, stop) {
                    return Err(EngineError::invariant(format!(
                        "stop loosened from {} to {}",
                        current_stop_price, stop
                    )));
                }

                let stop_raised = stop != current_stop_price;
                if stop_raised {
                    debug!(
                        side = %side,
                        peak = %peak,
                        distance = %distance,
                        previous_stop = %current_stop_price,
                        stop = %stop,
                        "Trailing stop tightened"
                    );
                }

                let trigger = is_trailing_stop_hit(side, current_price, stop).then_some(TriggerReason {
                    price: current_price,
                    stop,
                });

                Ok(TrailingUpdate {
                    state: TrailingStopState {
                        activation_threshold: state.activation_threshold,
                        phase: TrailingPhase::Active {
                            peak_price_seen: peak,
                            current_stop_price: stop,
                            activated_at,
                        },
                        last_updated: observed_at,
                    },
                    trigger,
                    effective_distance: Some(distance),
                    activated: false,
                    stop_raised,
                })
            },
        }
    }

    fn update_inactive(
        &self,
        state: &TrailingStopState,
        config: &TrailingStopConfig,
        side: Side,
        current_price: Price,
        gain: Decimal,
        observed_at: DateTime<Utc>,
    ) -> EngineResult<TrailingUpdate> {
        if gain < state.activation_threshold {
            return Ok(TrailingUpdate {
                state: TrailingStopState {
                    last_updated: observed_at,
                    ..state.clone()
                },
                trigger: None,
                effective_distance: None,
                activated: false,
                stop_raised: false,
            });
        }

        let distance = config.base_trailing_distance.max(config.min_trailing_distance);
        let stop = stop_from_extreme(side, current_price, distance)?;

        info!(
            side = %side,
            gain = %gain,
            peak = %current_price,
            stop = %stop,
            "Trailing stop activated"
        );

        Ok(TrailingUpdate {
            state: TrailingStopState {
                activation_threshold: state.activation_threshold,
                phase: TrailingPhase::Active {
                    peak_price_seen: current_price,
                    current_stop_price: stop,
                    activated_at: observed_at,
                },
                last_updated: observed_at,
            },
            trigger: None,
            effective_distance: Some(distance),
            activated: true,
            stop_raised: false,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
