//! Position Monitor
//!
//! One evaluation cycle for one position: guard checks, trailing stop update,
//! then a strict precedence chain that yields exactly one action.
//!
//! | # | Rule               | Action                           |
//! |---|--------------------|----------------------------------|
//! | 1 | profit target      | `ExitFull`, high                 |
//! | 2 | stop loss          | `ExitFull`, critical             |
//! | 3 | trailing stop      | `ExitFull`, critical             |
//! | 4 | edge decay         | `ExitFull`, medium               |
//! | 5 | partial-exit tier  | `ExitPartial`, medium            |
//! | 6 | scaling (opt-in)   | `ScaleIn` / `ScaleOut`           |
//! | 7 | otherwise          | `Hold`                           |
//!
//! Hard faults never escape: they degrade the cycle to `Hold` with an alert
//! and no state change.

use precog_domain::{
    CadenceConfig, ExitReason, ExitRuleConfig, MarketSnapshot, Position, PositionAction, Priority, UserId,
};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cadence::{select_band, MonitoringBand};
use crate::error::{EngineError, EngineResult};
use crate::tracker::{TrailingStopTracker, TrailingUpdate};

/// Inputs for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    /// User asking for the evaluation
    pub caller: UserId,
    /// Position as loaded by the caller, `None` if the lookup found nothing
    pub position: Option<&'a Position>,
    pub market: &'a MarketSnapshot,
    /// Effective rules for this position
    pub rules: &'a ExitRuleConfig,
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub action: PositionAction,
    /// Wait before the next evaluation
    pub next_check: Duration,
    pub band: MonitoringBand,
    /// New snapshot to persist; `None` when nothing may change
    pub updated_position: Option<Position>,
    /// Set when the cycle degraded on a hard fault
    pub alert: Option<String>,
    /// Trailing stop update applied this cycle, if any
    pub trailing: Option<TrailingUpdate>,
}

impl Evaluation {
    pub fn is_degraded(&self) -> bool {
        self.alert.is_some()
    }
}

/// Stateless position monitor
#[derive(Debug, Clone, Default)]
pub struct PositionMonitor {
    cadence: CadenceConfig,
}

impl PositionMonitor {
    pub fn new(cadence: CadenceConfig) -> Self {
        Self { cadence }
    }

    pub fn cadence(&self) -> &CadenceConfig {
        &self.cadence
    }

    /// Evaluate one position against one market snapshot
    pub fn evaluate(&self, request: EvaluationRequest<'_>) -> Evaluation {
        let position = match self.guard(&request) {
            Ok(position) => position,
            Err(reason) => {
                debug!(caller = %request.caller, reason = %reason, "Evaluation refused");
                return self.finish(PositionAction::error(reason), MonitoringBand::Default, None, None, None);
            },
        };

        match self.evaluate_open(position, request.market, request.rules) {
            Ok(evaluation) => evaluation,
            Err(e) => self.degrade(position, request.market, e),
        }
    }

    fn guard<'a>(&self, request: &EvaluationRequest<'a>) -> Result<&'a Position, String> {
        let Some(position) = request.position else {
            return Err("not found".to_string());
        };
        let Some(owner) = position.user_id else {
            return Err(format!("position {} has no owning user", position.id));
        };
        if owner != request.caller {
            // Foreign positions are indistinguishable from missing ones
            return Err("not found".to_string());
        }
        if position.is_closed() {
            return Err(format!("position {} is closed", position.id));
        }
        if position.ticker != request.market.ticker {
            return Err(format!(
                "market ticker {} does not match position ticker {}",
                request.market.ticker, position.ticker
            ));
        }
        Ok(position)
    }

    fn evaluate_open(
        &self,
        position: &Position,
        market: &MarketSnapshot,
        rules: &ExitRuleConfig,
    ) -> EngineResult<Evaluation> {
        let price = market.price;
        let gain = position.favorable_gain(price).ok_or_else(|| {
            EngineError::arithmetic(format!("gain overflow at entry {} price {}", position.entry_price, price))
        })?;

        let mut updated = position.clone();

        // The trail sees every observation, even when another rule wins
        let trailing = match (&position.trailing_stop, &rules.trailing_stop) {
            (Some(state), Some(config)) => {
                let update = TrailingStopTracker::new(*config).update(
                    state,
                    position.side,
                    position.entry_price,
                    price,
                    market.observed_at,
                )?;
                updated.trailing_stop = Some(update.state.clone());
                Some(update)
            },
            (Some(_), None) => {
                warn!(
                    position_id = %position.id,
                    "Position carries trailing stop state but rules have no trailing config, skipping rule"
                );
                None
            },
            (None, _) => None,
        };

        let action = self.select_action(&mut updated, gain, market.edge, rules, trailing.as_ref())?;

        let band = if action.is_exit() {
            MonitoringBand::Critical
        } else {
            select_band(&self.cadence, &market.predicates, Some(gain))
        };

        if action.is_hold() {
            debug!(position_id = %position.id, gain = %gain, band = %band, "Hold");
        } else {
            info!(
                position_id = %position.id,
                ticker = %position.ticker,
                price = %price,
                gain = %gain,
                action = %action,
                "Position action emitted"
            );
        }

        Ok(self.finish(action, band, Some(updated), None, trailing))
    }

    fn select_action(
        &self,
        updated: &mut Position,
        gain: Decimal,
        edge: Option<Decimal>,
        rules: &ExitRuleConfig,
        trailing: Option<&TrailingUpdate>,
    ) -> EngineResult<PositionAction> {
        // 1. Profit target
        if gain >= rules.profit_target {
            return Ok(PositionAction::exit_full(
                ExitReason::ProfitTarget,
                format!("gain {} >= profit target {}", gain, rules.profit_target),
                Priority::High,
            ));
        }

        // 2. Stop loss
        let stop_floor = -rules.stop_loss.abs();
        if gain <= stop_floor {
            return Ok(PositionAction::exit_full(
                ExitReason::StopLoss,
                format!("gain {} <= stop loss {}", gain, stop_floor),
                Priority::Critical,
            ));
        }

        // 3. Trailing stop
        if let Some(trigger) = trailing.and_then(|u| u.trigger.as_ref()) {
            return Ok(PositionAction::exit_full(
                ExitReason::TrailingStop,
                trigger.to_string(),
                Priority::Critical,
            ));
        }

        // 4. Edge decay
        if let Some(edge) = edge {
            if edge < rules.early_exit_edge {
                return Ok(PositionAction::exit_full(
                    ExitReason::EdgeDecay,
                    format!("edge {} < early exit threshold {}", edge, rules.early_exit_edge),
                    Priority::Medium,
                ));
            }
        }

        // 5. Next untaken partial tier
        let taken = updated.partial_exits_taken;
        if let Some(tier) = rules.partial_exits.get(taken as usize) {
            if gain >= tier.trigger_gain {
                let action = PositionAction::exit_partial(
                    ExitReason::PartialTarget,
                    format!(
                        "gain {} >= partial exit trigger {} (tier {})",
                        gain,
                        tier.trigger_gain,
                        taken + 1
                    ),
                    tier.exit_fraction,
                    Priority::Medium,
                )?;
                updated.partial_exits_taken = taken + 1;
                return Ok(action);
            }
        }

        // 6. Scaling
        if let (Some(scaling), Some(edge)) = (&rules.scaling, edge) {
            if edge >= scaling.scale_in_edge && gain >= Decimal::ZERO {
                return Ok(PositionAction::scale_in(
                    scaling.add_fraction,
                    format!("edge {} >= scale-in edge {}", edge, scaling.scale_in_edge),
                )?);
            }
            if edge <= scaling.scale_out_edge {
                return Ok(PositionAction::scale_out(
                    scaling.reduce_fraction,
                    format!("edge {} <= scale-out edge {}", edge, scaling.scale_out_edge),
                )?);
            }
        }

        // 7. Hold
        Ok(PositionAction::hold(format!("no exit rule met at gain {}", gain)))
    }

    fn degrade(&self, position: &Position, market: &MarketSnapshot, fault: EngineError) -> Evaluation {
        let alert = format!("evaluation of position {} degraded to hold: {}", position.id, fault);
        error!(
            position_id = %position.id,
            price = %market.price,
            error = %fault,
            "Evaluation fault, holding"
        );
        self.finish(
            PositionAction::hold("evaluation degraded"),
            MonitoringBand::Critical,
            None,
            Some(alert),
            None,
        )
    }

    fn finish(
        &self,
        action: PositionAction,
        band: MonitoringBand,
        updated_position: Option<Position>,
        alert: Option<String>,
        trailing: Option<TrailingUpdate>,
    ) -> Evaluation {
        Evaluation {
            action,
            next_check: band.interval(&self.cadence),
            band,
            updated_position,
            alert,
            trailing,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use precog_domain::{
        MonitoringPredicates, OpenPosition, PartialExitTier, Price, ScalingConfig, Side, Ticker, TrailingStopConfig,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    const TICKER: &str = "KXNFLGAME-25NOV16KCBUF-KC";

    fn open(user: UserId, side: Side, trailing: Option<&TrailingStopConfig>) -> Position {
        Position::open(
            OpenPosition {
                user_id: user,
                strategy_version_id: "halftime_entry:v1.2".to_string(),
                model_version_id: "elo_nfl:v3".to_string(),
                ticker: Ticker::new(TICKER).unwrap(),
                side,
                quantity: 100,
                entry_price: Price::new(dec!(0.50)).unwrap(),
                entry_time: start(),
            },
            trailing,
        )
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-16T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn market(price: Decimal, secs: i64) -> MarketSnapshot {
        MarketSnapshot::new(
            Ticker::new(TICKER).unwrap(),
            Price::new(price).unwrap(),
            start() + ChronoDuration::seconds(secs),
        )
    }

    fn eval(user: UserId, position: &Position, market: &MarketSnapshot, rules: &ExitRuleConfig) -> Evaluation {
        PositionMonitor::default().evaluate(EvaluationRequest {
            caller: user,
            position: Some(position),
            market,
            rules,
        })
    }

    #[test]
    fn test_missing_position_is_not_found() {
        let rules = ExitRuleConfig::default();
        let evaluation = PositionMonitor::default().evaluate(EvaluationRequest {
            caller: Uuid::now_v7(),
            position: None,
            market: &market(dec!(0.50), 1),
            rules: &rules,
        });

        assert_eq!(evaluation.action, PositionAction::error("not found"));
        assert!(evaluation.updated_position.is_none());
    }

    #[test]
    fn test_foreign_position_is_not_found() {
        let position = open(Uuid::now_v7(), Side::Yes, None);
        let evaluation = eval(Uuid::now_v7(), &position, &market(dec!(0.50), 1), &ExitRuleConfig::default());
        assert_eq!(evaluation.action, PositionAction::error("not found"));
    }

    #[test]
    fn test_ownerless_position_is_error() {
        let user = Uuid::now_v7();
        let mut position = open(user, Side::Yes, None);
        position.user_id = None;

        let evaluation = eval(user, &position, &market(dec!(0.50), 1), &ExitRuleConfig::default());
        assert_eq!(
            evaluation.action,
            PositionAction::error(format!("position {} has no owning user", position.id))
        );
    }

    #[test]
    fn test_closed_position_is_error() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None)
            .close(Price::new(dec!(0.60)).unwrap(), start())
            .unwrap();

        let evaluation = eval(user, &position, &market(dec!(0.60), 1), &ExitRuleConfig::default());
        assert!(matches!(evaluation.action, PositionAction::Error { ref reason } if reason.ends_with("is closed")));
    }

    #[test]
    fn test_ticker_mismatch_is_error() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None);
        let other = MarketSnapshot::new(
            Ticker::new("KXNBAGAME-25DEC01LALBOS-LAL").unwrap(),
            Price::new(dec!(0.50)).unwrap(),
            start(),
        );

        let evaluation = eval(user, &position, &other, &ExitRuleConfig::default());
        assert!(matches!(evaluation.action, PositionAction::Error { ref reason } if reason.contains(TICKER)));
    }

    #[test]
    fn test_profit_target_beats_edge_decay() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None);
        // gain 0.22, edge far below the early-exit threshold
        let snapshot = market(dec!(0.61), 1).with_edge(dec!(-0.05));

        let evaluation = eval(user, &position, &snapshot, &ExitRuleConfig::default());

        match &evaluation.action {
            PositionAction::ExitFull { reason, detail, priority } => {
                assert_eq!(*reason, ExitReason::ProfitTarget);
                assert_eq!(*priority, Priority::High);
                assert!(detail.contains("profit target 0.20"), "{}", detail);
                assert!(!detail.contains("edge"));
            },
            other => panic!("expected profit target exit, got {:?}", other),
        }
        assert_eq!(evaluation.band, MonitoringBand::Critical);
        assert_eq!(evaluation.next_check, std::time::Duration::from_secs(15));
    }

    #[test]
    fn test_stop_loss_is_critical() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None);

        let evaluation = eval(user, &position, &market(dec!(0.42), 1), &ExitRuleConfig::default());
        assert_eq!(evaluation.action.exit_reason(), Some(ExitReason::StopLoss));
        assert_eq!(evaluation.action.priority(), Some(Priority::Critical));
    }

    #[test]
    fn test_no_side_stop_loss_when_price_rises() {
        let user = Uuid::now_v7();
        let position = open(user, Side::No, None);

        let evaluation = eval(user, &position, &market(dec!(0.60), 1), &ExitRuleConfig::default());
        assert_eq!(evaluation.action.exit_reason(), Some(ExitReason::StopLoss));
    }

    #[test]
    fn test_trailing_stop_exit() {
        let user = Uuid::now_v7();
        let trailing = TrailingStopConfig::default();
        let rules = ExitRuleConfig {
            profit_target: dec!(0.50),
            trailing_stop: Some(trailing),
            ..ExitRuleConfig::default()
        };

        let mut position = open(user, Side::Yes, Some(&trailing));
        for (i, p) in [dec!(0.54), dec!(0.56), dec!(0.65)].into_iter().enumerate() {
            let evaluation = eval(user, &position, &market(p, i as i64 + 1), &rules);
            assert!(evaluation.action.is_hold(), "{:?}", evaluation.action);
            position = evaluation.updated_position.unwrap();
        }
        assert_eq!(position.trailing_stop_price(), Some(Price::new(dec!(0.6370)).unwrap()));

        let evaluation = eval(user, &position, &market(dec!(0.62), 10), &rules);
        match &evaluation.action {
            PositionAction::ExitFull { reason, detail, priority } => {
                assert_eq!(*reason, ExitReason::TrailingStop);
                assert_eq!(*priority, Priority::Critical);
                assert_eq!(detail, "trailing stop hit: price 0.6200 crossed stop 0.6370");
            },
            other => panic!("expected trailing stop exit, got {:?}", other),
        }
    }

    #[test]
    fn test_trail_updates_even_when_profit_target_wins() {
        let user = Uuid::now_v7();
        let trailing = TrailingStopConfig::default();
        let rules = ExitRuleConfig {
            trailing_stop: Some(trailing),
            ..ExitRuleConfig::default()
        };
        let position = open(user, Side::Yes, Some(&trailing));

        // Single-tick spike past the target
        let evaluation = eval(user, &position, &market(dec!(0.70), 1), &rules);
        assert_eq!(evaluation.action.exit_reason(), Some(ExitReason::ProfitTarget));

        let updated = evaluation.updated_position.unwrap();
        let state = updated.trailing_stop.unwrap();
        assert!(state.is_activated());
        assert_eq!(state.peak_price_seen(), Some(Price::new(dec!(0.70)).unwrap()));
    }

    #[test]
    fn test_trailing_state_without_config_is_skipped() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, Some(&TrailingStopConfig::default()));

        let evaluation = eval(user, &position, &market(dec!(0.52), 1), &ExitRuleConfig::default());
        assert!(evaluation.action.is_hold());
        assert!(evaluation.trailing.is_none());
        assert_eq!(evaluation.updated_position.unwrap().trailing_stop, position.trailing_stop);
    }

    #[test]
    fn test_edge_decay_exit() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None);
        let snapshot = market(dec!(0.52), 1).with_edge(dec!(0.01));

        let evaluation = eval(user, &position, &snapshot, &ExitRuleConfig::default());
        match &evaluation.action {
            PositionAction::ExitFull { reason, detail, priority } => {
                assert_eq!(*reason, ExitReason::EdgeDecay);
                assert_eq!(*priority, Priority::Medium);
                assert_eq!(detail, "edge 0.01 < early exit threshold 0.02");
            },
            other => panic!("expected edge decay exit, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_tiers_fire_once_each() {
        let user = Uuid::now_v7();
        let rules = ExitRuleConfig {
            partial_exits: vec![
                PartialExitTier {
                    trigger_gain: dec!(0.10),
                    exit_fraction: dec!(0.5),
                },
                PartialExitTier {
                    trigger_gain: dec!(0.15),
                    exit_fraction: dec!(0.25),
                },
            ],
            ..ExitRuleConfig::default()
        };
        let position = open(user, Side::Yes, None);

        let first = eval(user, &position, &market(dec!(0.56), 1), &rules);
        assert!(matches!(
            first.action,
            PositionAction::ExitPartial { exit_fraction, priority: Priority::Medium, .. } if exit_fraction == dec!(0.5)
        ));
        let position = first.updated_position.unwrap();
        assert_eq!(position.partial_exits_taken, 1);

        // Same gain again: tier 1 is spent, tier 2 not reached
        let second = eval(user, &position, &market(dec!(0.56), 2), &rules);
        assert!(second.action.is_hold());
        let position = second.updated_position.unwrap();
        assert_eq!(position.partial_exits_taken, 1);

        let third = eval(user, &position, &market(dec!(0.58), 3), &rules);
        assert!(matches!(
            third.action,
            PositionAction::ExitPartial { exit_fraction, .. } if exit_fraction == dec!(0.25)
        ));
        assert_eq!(third.updated_position.unwrap().partial_exits_taken, 2);
    }

    #[test]
    fn test_scaling_only_when_configured() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None);
        let snapshot = market(dec!(0.51), 1).with_edge(dec!(0.12));

        let plain = eval(user, &position, &snapshot, &ExitRuleConfig::default());
        assert!(plain.action.is_hold());

        let rules = ExitRuleConfig {
            scaling: Some(ScalingConfig {
                scale_in_edge: dec!(0.10),
                add_fraction: dec!(0.25),
                scale_out_edge: dec!(0.03),
                reduce_fraction: dec!(0.5),
            }),
            ..ExitRuleConfig::default()
        };
        let scaled = eval(user, &position, &snapshot, &rules);
        assert!(matches!(scaled.action, PositionAction::ScaleIn { add_fraction, .. } if add_fraction == dec!(0.25)));

        let thin = market(dec!(0.51), 2).with_edge(dec!(0.025));
        let reduced = eval(user, &position, &thin, &rules);
        assert!(matches!(reduced.action, PositionAction::ScaleOut { .. }));
    }

    #[test]
    fn test_hold_is_idempotent() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None);
        let snapshot = market(dec!(0.52), 1).with_edge(dec!(0.05));
        let rules = ExitRuleConfig::default();

        let first = eval(user, &position, &snapshot, &rules);
        for _ in 0..5 {
            let again = eval(user, &position, &snapshot, &rules);
            assert!(again.action.is_hold());
            assert_eq!(again, first);
        }
        assert_eq!(first.updated_position.as_ref(), Some(&position));
    }

    #[test]
    fn test_cadence_follows_predicates_on_hold() {
        let user = Uuid::now_v7();
        let position = open(user, Side::Yes, None);
        let snapshot = market(dec!(0.51), 1).with_predicates(MonitoringPredicates {
            no_live_game: true,
            ..MonitoringPredicates::default()
        });

        let evaluation = eval(user, &position, &snapshot, &ExitRuleConfig::default());
        assert_eq!(evaluation.band, MonitoringBand::Slow);
        assert_eq!(evaluation.next_check, std::time::Duration::from_secs(120));
    }

    #[test]
    fn test_out_of_order_tick_degrades_to_hold() {
        let user = Uuid::now_v7();
        let trailing = TrailingStopConfig::default();
        let rules = ExitRuleConfig {
            trailing_stop: Some(trailing),
            ..ExitRuleConfig::default()
        };
        let position = open(user, Side::Yes, Some(&trailing));
        let position = eval(user, &position, &market(dec!(0.51), 10), &rules)
            .updated_position
            .unwrap();

        let evaluation = eval(user, &position, &market(dec!(0.52), 5), &rules);
        assert!(evaluation.action.is_hold());
        assert!(evaluation.is_degraded());
        assert!(evaluation.updated_position.is_none());
        assert_eq!(evaluation.band, MonitoringBand::Critical);
    }

    #[test]
    fn test_profit_and_stop_never_both_fire() {
        let user = Uuid::now_v7();
        let monitor = PositionMonitor::default();
        let targets = [dec!(0.05), dec!(0.10), dec!(0.20), dec!(0.50)];
        let stops = [dec!(0.05), dec!(0.15), dec!(0.30), dec!(0.90)];

        for side in [Side::Yes, Side::No] {
            let position = open(user, side, None);
            for cents in 1..100 {
                let snapshot = market(Decimal::from(cents) / dec!(100), 1);
                for target in targets {
                    for stop in stops {
                        let rules = ExitRuleConfig {
                            profit_target: target,
                            stop_loss: stop,
                            ..ExitRuleConfig::default()
                        };
                        let gain = position.favorable_gain(snapshot.price).unwrap();
                        let profit = gain >= target;
                        let loss = gain <= -stop;
                        assert!(!(profit && loss));

                        let evaluation = monitor.evaluate(EvaluationRequest {
                            caller: user,
                            position: Some(&position),
                            market: &snapshot,
                            rules: &rules,
                        });
                        let reason = evaluation.action.exit_reason();
                        if profit {
                            assert_eq!(reason, Some(ExitReason::ProfitTarget));
                        } else if loss {
                            assert_eq!(reason, Some(ExitReason::StopLoss));
                        }
                    }
                }
            }
        }
    }
}
