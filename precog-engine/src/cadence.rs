//! Monitoring cadence selection
//!
//! Picks how long to wait before the next evaluation of a position from the
//! externally evaluated market predicates and the position's own swing.

use precog_domain::{CadenceConfig, MonitoringPredicates};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Monitoring frequency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringBand {
    Critical,
    Default,
    Slow,
}

impl MonitoringBand {
    pub fn name(&self) -> &'static str {
        match self {
            MonitoringBand::Critical => "critical",
            MonitoringBand::Default => "default",
            MonitoringBand::Slow => "slow",
        }
    }

    /// Poll interval for this band
    pub fn interval(&self, config: &CadenceConfig) -> Duration {
        match self {
            MonitoringBand::Critical => config.critical,
            MonitoringBand::Default => config.default,
            MonitoringBand::Slow => config.slow,
        }
    }
}

impl fmt::Display for MonitoringBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Select the band for one cycle
///
/// Every matching band is a candidate and the shortest interval wins; with no
/// match the default band applies. `gain` is `None` when it could not be
/// computed, in which case the swing check is skipped.
pub fn select_band(config: &CadenceConfig, predicates: &MonitoringPredicates, gain: Option<Decimal>) -> MonitoringBand {
    let swinging = gain.is_some_and(|g| g.abs() >= config.swing_threshold);

    let mut candidates = Vec::with_capacity(3);
    if predicates.late_and_close || predicates.large_swing || swinging {
        candidates.push(MonitoringBand::Critical);
    }
    if predicates.low_edge {
        candidates.push(MonitoringBand::Default);
    }
    if predicates.thin_spread || predicates.no_live_game {
        candidates.push(MonitoringBand::Slow);
    }

    candidates
        .into_iter()
        .min_by_key(|band| band.interval(config))
        .unwrap_or(MonitoringBand::Default)
}
