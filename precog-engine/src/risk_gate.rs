//! Risk Gate
//!
//! Admission control for new positions. Checks run in a fixed order and the
//! first failure short-circuits, so the rejection always names the earliest
//! violated limit.
//!
//! | # | Check                          |
//! |---|--------------------------------|
//! | 0 | input validation               |
//! | 1 | position size                  |
//! | 2 | total exposure                 |
//! | 3 | per-sport exposure             |
//! | 4 | per-event exposure             |
//! | 5 | correlated exposure            |
//! | 6 | daily realized loss            |
//! | 7 | weekly realized loss           |
//! | 8 | maximum loss on this position  |

use precog_domain::{ExposureSnapshot, OpenProposal, RiskLimits};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// =============================================================================
// Decision types
// =============================================================================

/// Which gate check produced a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCheck {
    InvalidInput,
    PositionSize,
    TotalExposure,
    SportExposure,
    EventExposure,
    CorrelatedExposure,
    DailyLoss,
    WeeklyLoss,
    PositionLoss,
}

impl RiskCheck {
    /// Position of the check in evaluation order
    pub fn number(&self) -> u8 {
        match self {
            RiskCheck::InvalidInput => 0,
            RiskCheck::PositionSize => 1,
            RiskCheck::TotalExposure => 2,
            RiskCheck::SportExposure => 3,
            RiskCheck::EventExposure => 4,
            RiskCheck::CorrelatedExposure => 5,
            RiskCheck::DailyLoss => 6,
            RiskCheck::WeeklyLoss => 7,
            RiskCheck::PositionLoss => 8,
        }
    }

    /// Stable name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            RiskCheck::InvalidInput => "invalid_input",
            RiskCheck::PositionSize => "position_size",
            RiskCheck::TotalExposure => "total_exposure",
            RiskCheck::SportExposure => "sport_exposure",
            RiskCheck::EventExposure => "event_exposure",
            RiskCheck::CorrelatedExposure => "correlated_exposure",
            RiskCheck::DailyLoss => "daily_loss",
            RiskCheck::WeeklyLoss => "weekly_loss",
            RiskCheck::PositionLoss => "position_loss",
        }
    }
}

impl fmt::Display for RiskCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.number(), self.name())
    }
}

/// A rejected proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRejection {
    pub check: RiskCheck,
    /// Names the limit and the values that breached it
    pub reason: String,
}

impl RiskRejection {
    fn new(check: RiskCheck, reason: String) -> Self {
        Self { check, reason }
    }
}

/// Outcome of the Risk Gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskDecision {
    Admit,
    Reject(RiskRejection),
}

impl RiskDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RiskDecision::Admit)
    }

    /// The rejection, if rejected
    pub fn rejection(&self) -> Option<&RiskRejection> {
        match self {
            RiskDecision::Admit => None,
            RiskDecision::Reject(rejection) => Some(rejection),
        }
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Stateless admission gate
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskGate;

impl RiskGate {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether a proposed position may open
    ///
    /// Pure: the same inputs always yield the same decision.
    pub fn evaluate_open(
        &self,
        proposal: &OpenProposal,
        exposure: &ExposureSnapshot,
        limits: &RiskLimits,
    ) -> RiskDecision {
        let decision = match run_checks(proposal, exposure, limits) {
            Ok(()) => RiskDecision::Admit,
            Err(rejection) => RiskDecision::Reject(rejection),
        };

        match &decision {
            RiskDecision::Admit => debug!(
                ticker = %proposal.ticker,
                size = %proposal.size,
                "Open proposal admitted"
            ),
            RiskDecision::Reject(rejection) => debug!(
                ticker = %proposal.ticker,
                size = %proposal.size,
                check = rejection.check.number(),
                reason = %rejection.reason,
                "Open proposal rejected"
            ),
        }

        decision
    }
}

fn run_checks(
    proposal: &OpenProposal,
    exposure: &ExposureSnapshot,
    limits: &RiskLimits,
) -> Result<(), RiskRejection> {
    let size = proposal.size;

    // 0. Input validation
    if size <= Decimal::ZERO {
        return Err(RiskRejection::new(
            RiskCheck::InvalidInput,
            format!("invalid input: non-positive size: {}", n(size)),
        ));
    }
    let aggregates = [
        ("total exposure", exposure.total),
        ("sport exposure", exposure.sport),
        ("event exposure", exposure.event),
        ("correlated exposure", exposure.correlated),
    ];
    for (name, value) in aggregates {
        if value < Decimal::ZERO {
            return Err(RiskRejection::new(
                RiskCheck::InvalidInput,
                format!("invalid input: negative {}: {}", name, n(value)),
            ));
        }
    }

    // 1. Position size
    let limit = limits.max_position_size_dollars;
    if size > limit {
        return Err(RiskRejection::new(
            RiskCheck::PositionSize,
            format!("position size limit exceeded: {} > {}", n(size), n(limit)),
        ));
    }

    // 2. Total exposure
    let sum = add(exposure.total, size, "total exposure")?;
    let limit = limits.max_total_exposure_dollars;
    if sum > limit {
        return Err(RiskRejection::new(
            RiskCheck::TotalExposure,
            format!("total exposure limit exceeded: {} > {}", n(sum), n(limit)),
        ));
    }

    // 3. Sport exposure
    let sum = add(exposure.sport, size, "sport exposure")?;
    let limit = limits.sport_limit(proposal.sport.as_ref());
    if sum > limit {
        let sport = proposal
            .sport
            .as_ref()
            .map_or_else(|| "unspecified sport".to_string(), ToString::to_string);
        return Err(RiskRejection::new(
            RiskCheck::SportExposure,
            format!("sport exposure limit exceeded for {}: {} > {}", sport, n(sum), n(limit)),
        ));
    }

    // 4. Event exposure
    let sum = add(exposure.event, size, "event exposure")?;
    let limit = limits.max_exposure_per_event_dollars;
    if sum > limit {
        return Err(RiskRejection::new(
            RiskCheck::EventExposure,
            format!(
                "event exposure limit exceeded for {}: {} > {}",
                proposal.event_id,
                n(sum),
                n(limit)
            ),
        ));
    }

    // 5. Correlated exposure
    let sum = add(exposure.correlated, size, "correlated exposure")?;
    let limit = limits.max_correlated_exposure_dollars;
    if sum > limit {
        return Err(RiskRejection::new(
            RiskCheck::CorrelatedExposure,
            format!("correlated exposure limit exceeded: {} > {}", n(sum), n(limit)),
        ));
    }

    // 6. Daily loss, independent of size
    let floor = limits.daily_loss_floor();
    if exposure.daily_realized_pnl <= floor {
        return Err(RiskRejection::new(
            RiskCheck::DailyLoss,
            format!(
                "daily loss limit reached: {} <= {}",
                n(exposure.daily_realized_pnl),
                n(floor)
            ),
        ));
    }

    // 7. Weekly loss
    let floor = limits.weekly_loss_floor();
    if exposure.weekly_realized_pnl <= floor {
        return Err(RiskRejection::new(
            RiskCheck::WeeklyLoss,
            format!(
                "weekly loss limit reached: {} <= {}",
                n(exposure.weekly_realized_pnl),
                n(floor)
            ),
        ));
    }

    // 8. A binary contract can lose its whole stake
    let limit = limits.max_loss_per_position_dollars;
    if size > limit {
        return Err(RiskRejection::new(
            RiskCheck::PositionLoss,
            format!("per-position loss limit exceeded: {} > {}", n(size), n(limit)),
        ));
    }

    Ok(())
}

fn add(current: Decimal, size: Decimal, name: &str) -> Result<Decimal, RiskRejection> {
    current.checked_add(size).ok_or_else(|| {
        RiskRejection::new(
            RiskCheck::InvalidInput,
            format!("invalid input: {} overflows with size {}", name, n(size)),
        )
    })
}

fn n(value: Decimal) -> Decimal {
    value.normalize()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use precog_domain::{EventId, Sport, Ticker};
    use rust_decimal_macros::dec;

    fn proposal(size: Decimal) -> OpenProposal {
        OpenProposal {
            size,
            sport: Some(Sport::new("nfl").unwrap()),
            event_id: EventId::new("nfl-2025-w11-kc-buf").unwrap(),
            ticker: Ticker::new("KXNFLGAME-25NOV16KCBUF-KC").unwrap(),
        }
    }

    fn rejected(decision: RiskDecision) -> RiskRejection {
        match decision {
            RiskDecision::Reject(rejection) => rejection,
            RiskDecision::Admit => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_admits_within_all_limits() {
        let decision =
            RiskGate::new().evaluate_open(&proposal(dec!(100)), &ExposureSnapshot::default(), &RiskLimits::default());
        assert!(decision.is_admitted());
        assert!(decision.rejection().is_none());
    }

    #[test]
    fn test_total_exposure_rejection_message() {
        let limits = RiskLimits {
            max_total_exposure_dollars: dec!(10000),
            ..RiskLimits::default()
        };
        let exposure = ExposureSnapshot {
            total: dec!(9800),
            ..ExposureSnapshot::default()
        };

        let rejection = rejected(RiskGate::new().evaluate_open(&proposal(dec!(300)), &exposure, &limits));

        assert_eq!(rejection.check, RiskCheck::TotalExposure);
        assert_eq!(rejection.check.number(), 2);
        assert_eq!(rejection.reason, "total exposure limit exceeded: 10100 > 10000");
    }

    #[test]
    fn test_trailing_zeros_are_normalized() {
        let limits = RiskLimits {
            max_total_exposure_dollars: dec!(10000.00),
            ..RiskLimits::default()
        };
        let exposure = ExposureSnapshot {
            total: dec!(9800.00),
            ..ExposureSnapshot::default()
        };

        let rejection = rejected(RiskGate::new().evaluate_open(&proposal(dec!(300.00)), &exposure, &limits));
        assert_eq!(rejection.reason, "total exposure limit exceeded: 10100 > 10000");
    }

    #[test]
    fn test_exactly_at_limit_is_admitted() {
        let limits = RiskLimits {
            max_total_exposure_dollars: dec!(10000),
            ..RiskLimits::default()
        };
        let exposure = ExposureSnapshot {
            total: dec!(9700),
            ..ExposureSnapshot::default()
        };
        assert!(RiskGate::new().evaluate_open(&proposal(dec!(300)), &exposure, &limits).is_admitted());
    }

    #[test]
    fn test_non_positive_size_is_invalid_input() {
        for size in [dec!(0), dec!(-50)] {
            let rejection = rejected(RiskGate::new().evaluate_open(
                &proposal(size),
                &ExposureSnapshot::default(),
                &RiskLimits::default(),
            ));
            assert_eq!(rejection.check, RiskCheck::InvalidInput);
            assert!(rejection.reason.starts_with("invalid input: non-positive size"));
        }
    }

    #[test]
    fn test_negative_aggregate_is_invalid_input() {
        let exposure = ExposureSnapshot {
            event: dec!(-1),
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(
            &proposal(dec!(10)),
            &exposure,
            &RiskLimits::default(),
        ));
        assert_eq!(rejection.check, RiskCheck::InvalidInput);
        assert_eq!(rejection.reason, "invalid input: negative event exposure: -1");
    }

    #[test]
    fn test_position_size_checked_first() {
        // Oversized and over every aggregate limit: check 1 reports
        let exposure = ExposureSnapshot {
            total: dec!(1000000),
            event: dec!(1000000),
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(
            &proposal(dec!(5000)),
            &exposure,
            &RiskLimits::default(),
        ));
        assert_eq!(rejection.check, RiskCheck::PositionSize);
        assert_eq!(rejection.reason, "position size limit exceeded: 5000 > 1000");
    }

    #[test]
    fn test_total_beats_event_when_both_fail() {
        let limits = RiskLimits::default();
        let exposure = ExposureSnapshot {
            total: dec!(9900),
            event: dec!(1950),
            ..ExposureSnapshot::default()
        };

        let rejection = rejected(RiskGate::new().evaluate_open(&proposal(dec!(200)), &exposure, &limits));
        assert_eq!(rejection.check, RiskCheck::TotalExposure);

        // Only the event check fails once total has room
        let exposure = ExposureSnapshot {
            total: dec!(0),
            ..exposure
        };
        let rejection = rejected(RiskGate::new().evaluate_open(&proposal(dec!(200)), &exposure, &limits));
        assert_eq!(rejection.check, RiskCheck::EventExposure);
        assert_eq!(
            rejection.reason,
            "event exposure limit exceeded for nfl-2025-w11-kc-buf: 2150 > 2000"
        );
    }

    #[test]
    fn test_sport_limit_uses_configured_then_default() {
        let mut limits = RiskLimits::default();
        limits
            .max_exposure_per_sport_dollars
            .insert(Sport::new("nfl").unwrap(), dec!(1000));
        let exposure = ExposureSnapshot {
            sport: dec!(900),
            ..ExposureSnapshot::default()
        };

        let rejection = rejected(RiskGate::new().evaluate_open(&proposal(dec!(200)), &exposure, &limits));
        assert_eq!(rejection.check, RiskCheck::SportExposure);
        assert_eq!(rejection.reason, "sport exposure limit exceeded for nfl: 1100 > 1000");

        // Unknown sport falls back to the 5000 default
        let mut other = proposal(dec!(200));
        other.sport = Some(Sport::new("nba").unwrap());
        assert!(RiskGate::new().evaluate_open(&other, &exposure, &limits).is_admitted());

        // Missing sport also uses the default
        let mut none = proposal(dec!(200));
        none.sport = None;
        let exposure = ExposureSnapshot {
            sport: dec!(4900),
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(&none, &exposure, &limits));
        assert_eq!(
            rejection.reason,
            "sport exposure limit exceeded for unspecified sport: 5100 > 5000"
        );
    }

    #[test]
    fn test_correlated_exposure() {
        let exposure = ExposureSnapshot {
            correlated: dec!(2900),
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(
            &proposal(dec!(150)),
            &exposure,
            &RiskLimits::default(),
        ));
        assert_eq!(rejection.check, RiskCheck::CorrelatedExposure);
        assert_eq!(rejection.reason, "correlated exposure limit exceeded: 3050 > 3000");
    }

    #[test]
    fn test_daily_loss_rejects_regardless_of_size() {
        let exposure = ExposureSnapshot {
            daily_realized_pnl: dec!(-500),
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(
            &proposal(dec!(1)),
            &exposure,
            &RiskLimits::default(),
        ));
        assert_eq!(rejection.check, RiskCheck::DailyLoss);
        assert_eq!(rejection.reason, "daily loss limit reached: -500 <= -500");

        // Just inside the limit is fine
        let exposure = ExposureSnapshot {
            daily_realized_pnl: dec!(-499.99),
            ..ExposureSnapshot::default()
        };
        assert!(RiskGate::new()
            .evaluate_open(&proposal(dec!(1)), &exposure, &RiskLimits::default())
            .is_admitted());
    }

    #[test]
    fn test_negative_configured_loss_limit_reads_as_magnitude() {
        let limits = RiskLimits {
            max_daily_loss_dollars: dec!(-500),
            ..RiskLimits::default()
        };
        let exposure = ExposureSnapshot {
            daily_realized_pnl: dec!(-600),
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(&proposal(dec!(10)), &exposure, &limits));
        assert_eq!(rejection.check, RiskCheck::DailyLoss);
    }

    #[test]
    fn test_weekly_loss() {
        let exposure = ExposureSnapshot {
            daily_realized_pnl: dec!(-100),
            weekly_realized_pnl: dec!(-1600),
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(
            &proposal(dec!(10)),
            &exposure,
            &RiskLimits::default(),
        ));
        assert_eq!(rejection.check, RiskCheck::WeeklyLoss);
        assert_eq!(rejection.check.number(), 7);
    }

    #[test]
    fn test_per_position_loss_limit() {
        let limits = RiskLimits {
            max_loss_per_position_dollars: dec!(250),
            ..RiskLimits::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(
            &proposal(dec!(300)),
            &ExposureSnapshot::default(),
            &limits,
        ));
        assert_eq!(rejection.check, RiskCheck::PositionLoss);
        assert_eq!(rejection.reason, "per-position loss limit exceeded: 300 > 250");
    }

    #[test]
    fn test_overflow_fails_closed() {
        let limits = RiskLimits {
            max_position_size_dollars: Decimal::MAX,
            ..RiskLimits::default()
        };
        let exposure = ExposureSnapshot {
            total: Decimal::MAX,
            ..ExposureSnapshot::default()
        };
        let rejection = rejected(RiskGate::new().evaluate_open(&proposal(dec!(1)), &exposure, &limits));
        assert_eq!(rejection.check, RiskCheck::InvalidInput);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let exposure = ExposureSnapshot {
            total: dec!(9800),
            ..ExposureSnapshot::default()
        };
        let gate = RiskGate::new();
        let first = gate.evaluate_open(&proposal(dec!(300)), &exposure, &RiskLimits::default());
        let second = gate.evaluate_open(&proposal(dec!(300)), &exposure, &RiskLimits::default());
        assert_eq!(first, second);
    }
}
