//! Per-position worker task.
//!
//! Each open position is owned by exactly one `PositionWorker`, which is the
//! only writer of that position's snapshot. All evaluations for a position are
//! therefore serialized through its inbox.
//!
//! # Architecture
//!
//! ```text
//! Daemon ── Tick / Evaluate / Stop ──> inbox (bounded mpsc)
//!                                        │
//!                                        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │ Async Loop                                           │
//! │ - Drop ticks older than the last applied observation │
//! │ - Fetch exit rules, run the Position Monitor         │
//! │ - Persist snapshot, append audit events              │
//! │ - Submit non-hold actions, publish on the event bus  │
//! │ - Poll market data on the returned cadence           │
//! │ - Check cancellation token between cycles            │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The worker stops after a full exit has been accepted by the execution
//! collaborator, after the monitor refuses the position, on `Stop`, or on
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use precog_domain::{
    Event, ExitRuleConfig, MarketSnapshot, Position, PositionAction, PositionId, Price, Ticker, TrailingStopConfig,
};
use precog_engine::{Evaluation, EvaluationRequest, PositionMonitor};
use precog_exec::{ExecutionPort, MarketDataPort, RulesPort};
use precog_store::Store;

use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{DaemonEvent, EventBus};
use crate::metrics::Metrics;

// =============================================================================
// Commands and Outcomes
// =============================================================================

/// Messages a worker accepts.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// Evaluate against a pushed market snapshot
    Tick(MarketSnapshot),
    /// Poll market data and evaluate now
    Evaluate,
    /// Stop after the current cycle
    Stop,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// A full exit was accepted by the execution collaborator
    Exited,
    /// The monitor refused the position (closed, unowned, mismatched)
    Refused,
    /// `Stop` received or the inbox closed
    Stopped,
    /// Cancellation token fired
    Cancelled,
}

/// Final state handed back when a worker finishes.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub position: Position,
    pub exit: WorkerExit,
    pub evaluations: u64,
}

enum Step {
    /// Keep going, next poll after this long
    Continue(Duration),
    /// Nothing applied, keep the previous poll interval
    Unchanged,
    Finish(WorkerExit),
}

// =============================================================================
// Shared Context
// =============================================================================

/// Collaborators shared by all workers of a daemon.
pub struct WorkerContext<S: Store + 'static> {
    pub store: Arc<S>,
    pub market_data: Arc<dyn MarketDataPort>,
    pub execution: Arc<dyn ExecutionPort>,
    pub rules: Arc<dyn RulesPort>,
    pub event_bus: Arc<EventBus>,
    pub metrics: Arc<Metrics>,
    pub monitor: PositionMonitor,
    /// Lowest trailing distance any rule set may use
    pub min_trailing_distance: Decimal,
}

impl<S: Store + 'static> Clone for WorkerContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            market_data: self.market_data.clone(),
            execution: self.execution.clone(),
            rules: self.rules.clone(),
            event_bus: self.event_bus.clone(),
            metrics: self.metrics.clone(),
            monitor: self.monitor.clone(),
            min_trailing_distance: self.min_trailing_distance,
        }
    }
}

// =============================================================================
// Worker Handle
// =============================================================================

/// Handle to a running worker.
pub struct WorkerHandle {
    position_id: PositionId,
    ticker: Ticker,
    sender: mpsc::Sender<WorkerCommand>,
    cancel_token: CancellationToken,
    join: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    pub fn position_id(&self) -> PositionId {
        self.position_id
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Push a market snapshot to the worker.
    pub async fn tick(&self, snapshot: MarketSnapshot) -> DaemonResult<()> {
        self.send(WorkerCommand::Tick(snapshot)).await
    }

    /// Ask the worker to poll market data now.
    pub async fn evaluate(&self) -> DaemonResult<()> {
        self.send(WorkerCommand::Evaluate).await
    }

    /// Ask the worker to stop after its current cycle.
    pub async fn stop(&self) -> DaemonResult<()> {
        self.send(WorkerCommand::Stop).await
    }

    /// Cloneable sending half, usable without holding the handle.
    pub fn mailbox(&self) -> WorkerMailbox {
        WorkerMailbox {
            position_id: self.position_id,
            sender: self.sender.clone(),
        }
    }

    /// Cancel the worker without waiting for queued commands.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker to finish.
    pub async fn join(self) -> DaemonResult<WorkerReport> {
        let position_id = self.position_id;
        self.join.await.map_err(|e| {
            error!(position_id = %position_id, error = %e, "Position worker task failed");
            DaemonError::WorkerClosed(position_id)
        })
    }

    async fn send(&self, command: WorkerCommand) -> DaemonResult<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| DaemonError::WorkerClosed(self.position_id))
    }
}

/// Sending half of a worker's inbox.
#[derive(Clone)]
pub struct WorkerMailbox {
    position_id: PositionId,
    sender: mpsc::Sender<WorkerCommand>,
}

impl WorkerMailbox {
    pub fn position_id(&self) -> PositionId {
        self.position_id
    }

    /// Push a market snapshot; waits while the inbox is full.
    pub async fn tick(&self, snapshot: MarketSnapshot) -> DaemonResult<()> {
        self.sender
            .send(WorkerCommand::Tick(snapshot))
            .await
            .map_err(|_| DaemonError::WorkerClosed(self.position_id))
    }
}

// =============================================================================
// Position Worker
// =============================================================================

/// Single-writer task for one open position.
pub struct PositionWorker<S: Store + 'static> {
    position: Position,
    ctx: WorkerContext<S>,
    inbox: mpsc::Receiver<WorkerCommand>,
    cancel_token: CancellationToken,
    /// Observation time of the last applied snapshot
    last_observed: Option<DateTime<Utc>>,
    evaluations: u64,
    /// Last clamped trailing configuration already flagged
    flagged_trailing: Option<TrailingStopConfig>,
}

impl<S: Store + 'static> PositionWorker<S> {
    /// Spawn a worker for `position`.
    ///
    /// The first market data poll happens immediately.
    pub fn spawn(
        position: Position,
        ctx: WorkerContext<S>,
        inbox_capacity: usize,
        cancel_token: CancellationToken,
    ) -> WorkerHandle {
        let (sender, inbox) = mpsc::channel(inbox_capacity.max(1));
        let position_id = position.id;
        let ticker = position.ticker.clone();

        let worker = Self {
            last_observed: position.trailing_stop.as_ref().map(|s| s.last_updated),
            position,
            ctx,
            inbox,
            cancel_token: cancel_token.clone(),
            evaluations: 0,
            flagged_trailing: None,
        };
        let join = tokio::spawn(worker.run());

        WorkerHandle {
            position_id,
            ticker,
            sender,
            cancel_token,
            join,
        }
    }

    async fn run(mut self) -> WorkerReport {
        let position_id = self.position.id;
        info!(
            position_id = %position_id,
            ticker = %self.position.ticker,
            side = %self.position.side,
            "Position worker started"
        );
        self.ctx.event_bus.send(DaemonEvent::WorkerStarted { position_id });

        let cancel_token = self.cancel_token.clone();
        let mut next_check = Duration::ZERO;

        let exit = loop {
            let command = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => None,
                command = self.inbox.recv() => Some(command.unwrap_or(WorkerCommand::Stop)),
                _ = tokio::time::sleep(next_check) => Some(WorkerCommand::Evaluate),
            };

            let step = match command {
                None => Step::Finish(WorkerExit::Cancelled),
                Some(WorkerCommand::Tick(snapshot)) => self.apply(snapshot).await,
                Some(WorkerCommand::Evaluate) => self.poll().await,
                Some(WorkerCommand::Stop) => Step::Finish(WorkerExit::Stopped),
            };

            match step {
                Step::Continue(interval) => next_check = interval,
                Step::Unchanged => {},
                Step::Finish(exit) => break exit,
            }
        };

        info!(
            position_id = %position_id,
            exit = ?exit,
            evaluations = self.evaluations,
            "Position worker stopped"
        );
        self.ctx.event_bus.send(DaemonEvent::WorkerStopped { position_id, exit });

        WorkerReport {
            position: self.position,
            exit,
            evaluations: self.evaluations,
        }
    }

    async fn poll(&mut self) -> Step {
        match self.ctx.market_data.snapshot(&self.position.ticker).await {
            Ok(snapshot) => self.apply(snapshot).await,
            Err(e) => {
                error!(
                    position_id = %self.position.id,
                    ticker = %self.position.ticker,
                    error = %e,
                    "Market data unavailable"
                );
                Step::Continue(self.ctx.monitor.cadence().critical)
            },
        }
    }

    async fn apply(&mut self, snapshot: MarketSnapshot) -> Step {
        if let Some(last) = self.last_observed {
            if snapshot.observed_at < last {
                warn!(
                    position_id = %self.position.id,
                    observed_at = %snapshot.observed_at,
                    last_applied = %last,
                    "Out-of-order tick dropped"
                );
                self.ctx.metrics.record_out_of_order();
                return Step::Unchanged;
            }
        }

        let fetched = self.ctx.rules.exit_rules(&self.position).await;
        let rules = match fetched {
            Ok(rules) => self.enforce_trailing_floor(rules),
            Err(e) => {
                error!(position_id = %self.position.id, error = %e, "Exit rules unavailable");
                return Step::Continue(self.ctx.monitor.cadence().critical);
            },
        };

        // Unowned positions are refused by the monitor regardless of caller
        let caller = self.position.user_id.unwrap_or_else(Uuid::nil);
        let evaluation = self.ctx.monitor.evaluate(EvaluationRequest {
            caller,
            position: Some(&self.position),
            market: &snapshot,
            rules: &rules,
        });
        self.evaluations += 1;
        self.ctx
            .metrics
            .record_evaluation(evaluation.action.kind(), evaluation.is_degraded());

        if let PositionAction::Error { reason } = &evaluation.action {
            warn!(position_id = %self.position.id, reason = %reason, "Position refused by monitor");
            return Step::Finish(WorkerExit::Refused);
        }

        if evaluation.is_degraded() {
            self.on_degraded(&evaluation, snapshot.observed_at).await;
            return Step::Continue(evaluation.next_check);
        }

        // A partial tier counts as taken only once execution accepts it
        let mut updated = evaluation.updated_position.clone();
        let pending_tier = updated.as_mut().and_then(|next| {
            let taken = next.partial_exits_taken;
            (taken > self.position.partial_exits_taken).then(|| {
                next.partial_exits_taken = self.position.partial_exits_taken;
                taken
            })
        });
        self.adopt(updated, &evaluation, snapshot.observed_at).await;

        if evaluation.action.is_hold() {
            debug!(
                position_id = %self.position.id,
                band = %evaluation.band,
                next_check_ms = evaluation.next_check.as_millis() as u64,
                "Holding"
            );
            return Step::Continue(evaluation.next_check);
        }

        let full_exit = matches!(evaluation.action, PositionAction::ExitFull { .. });
        let accepted = self.emit(&evaluation.action, snapshot.price, snapshot.observed_at).await;
        if !accepted {
            return Step::Continue(evaluation.next_check);
        }
        if full_exit {
            return Step::Finish(WorkerExit::Exited);
        }
        if let Some(taken) = pending_tier {
            self.commit_tier(taken).await;
        }

        Step::Continue(evaluation.next_check)
    }

    /// Raise the rule set's trailing minimum to the daemon floor.
    fn enforce_trailing_floor(&mut self, rules: ExitRuleConfig) -> ExitRuleConfig {
        let configured = rules.trailing_stop;
        let (rules, flag) = apply_trailing_floor(rules, self.ctx.min_trailing_distance, &mut self.flagged_trailing);

        if let (true, Some(configured), Some(effective)) = (flag, configured, rules.trailing_stop) {
            warn!(
                position_id = %self.position.id,
                configured_min = %configured.min_trailing_distance,
                floor = %self.ctx.min_trailing_distance,
                base = %effective.base_trailing_distance,
                effective_min = %effective.min_trailing_distance,
                "Trailing distance clamped by configuration"
            );
        }
        rules
    }

    /// Persist the updated snapshot and record trailing transitions.
    async fn adopt(&mut self, updated: Option<Position>, evaluation: &Evaluation, observed_at: DateTime<Utc>) {
        let Some(updated) = updated else {
            return;
        };
        let previous_stop = self.position.trailing_stop_price();

        if let Err(e) = self.ctx.store.positions().save(&updated).await {
            error!(position_id = %updated.id, error = %e, "Failed to persist position snapshot");
        }
        self.position = updated;
        self.last_observed = Some(observed_at);

        let Some(trailing) = &evaluation.trailing else {
            return;
        };
        let (Some(peak_price), Some(stop_price)) =
            (trailing.state.peak_price_seen(), trailing.state.current_stop_price())
        else {
            return;
        };

        if trailing.activated {
            self.record(Event::TrailingStopActivated {
                position_id: self.position.id,
                peak_price,
                stop_price,
                timestamp: observed_at,
            })
            .await;
        } else if trailing.stop_raised {
            if let Some(previous_stop) = previous_stop {
                self.record(Event::TrailingStopRaised {
                    position_id: self.position.id,
                    previous_stop,
                    new_stop: stop_price,
                    peak_price,
                    timestamp: observed_at,
                })
                .await;
            }
        }
    }

    async fn commit_tier(&mut self, taken: u32) {
        self.position.partial_exits_taken = taken;
        if let Err(e) = self.ctx.store.positions().save(&self.position).await {
            error!(position_id = %self.position.id, error = %e, "Failed to persist partial exit tier");
        }
    }

    async fn on_degraded(&self, evaluation: &Evaluation, observed_at: DateTime<Utc>) {
        let alert = evaluation.alert.clone().unwrap_or_default();
        self.record(Event::EvaluationDegraded {
            position_id: self.position.id,
            alert: alert.clone(),
            timestamp: observed_at,
        })
        .await;
        self.ctx.event_bus.send(DaemonEvent::EvaluationDegraded {
            position_id: self.position.id,
            alert,
            timestamp: observed_at,
        });
    }

    /// Audit, publish and submit a non-hold action.
    ///
    /// Returns whether the execution collaborator accepted it.
    async fn emit(&self, action: &PositionAction, price: Price, observed_at: DateTime<Utc>) -> bool {
        self.record(Event::ActionEmitted {
            position_id: self.position.id,
            action: action.clone(),
            price,
            timestamp: observed_at,
        })
        .await;
        self.ctx.event_bus.send(DaemonEvent::ActionEmitted {
            position_id: self.position.id,
            action: action.clone(),
            price,
            timestamp: observed_at,
        });

        match self.ctx.execution.submit(&self.position, action).await {
            Ok(receipt) => {
                info!(
                    position_id = %self.position.id,
                    submission_id = %receipt.submission_id,
                    action = %action,
                    "Action submitted"
                );
                true
            },
            Err(e) => {
                // Conditions are re-evaluated next cycle and re-emitted if still met
                error!(
                    position_id = %self.position.id,
                    action = %action,
                    error = %e,
                    "Action submission failed"
                );
                false
            },
        }
    }

    async fn record(&self, event: Event) {
        if let Err(e) = self.ctx.store.events().append(&event).await {
            error!(
                position_id = %self.position.id,
                event_type = event.event_type(),
                error = %e,
                "Failed to append audit event"
            );
        }
    }
}

/// Raise the trailing minimum to `floor`.
///
/// Returns the adjusted rules and whether the clamping needs flagging: the
/// minimum was raised or now exceeds the base distance, and this configured
/// rule set was not the last one flagged.
fn apply_trailing_floor(
    mut rules: ExitRuleConfig,
    floor: Decimal,
    flagged: &mut Option<TrailingStopConfig>,
) -> (ExitRuleConfig, bool) {
    let Some(trailing) = rules.trailing_stop.as_mut() else {
        return (rules, false);
    };
    let configured = *trailing;

    let raised = trailing.min_trailing_distance < floor;
    if raised {
        trailing.min_trailing_distance = floor;
    }

    let clamped = raised || trailing.min_exceeds_base();
    let flag = clamped && *flagged != Some(configured);
    if flag {
        *flagged = Some(configured);
    }
    (rules, flag)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rules(base: Decimal, min: Decimal) -> ExitRuleConfig {
        ExitRuleConfig {
            trailing_stop: Some(TrailingStopConfig {
                base_trailing_distance: base,
                min_trailing_distance: min,
                ..TrailingStopConfig::default()
            }),
            ..ExitRuleConfig::default()
        }
    }

    #[test]
    fn test_floor_raises_minimum() {
        let mut flagged = None;
        let (adjusted, flag) = apply_trailing_floor(rules(dec!(0.05), dec!(0.01)), dec!(0.02), &mut flagged);

        assert!(flag);
        assert_eq!(adjusted.trailing_stop.unwrap().min_trailing_distance, dec!(0.02));
    }

    #[test]
    fn test_clamped_rules_flagged_once() {
        let mut flagged = None;

        // Floor above base: every distance clamps to the floor
        let (adjusted, flag) = apply_trailing_floor(rules(dec!(0.05), dec!(0.02)), dec!(0.06), &mut flagged);
        assert!(flag);
        assert!(adjusted.trailing_stop.unwrap().min_exceeds_base());

        for _ in 0..3 {
            let (_, flag) = apply_trailing_floor(rules(dec!(0.05), dec!(0.02)), dec!(0.06), &mut flagged);
            assert!(!flag);
        }

        // A changed rule set is flagged again
        let (_, flag) = apply_trailing_floor(rules(dec!(0.04), dec!(0.02)), dec!(0.06), &mut flagged);
        assert!(flag);
    }

    #[test]
    fn test_unclamped_rules_untouched() {
        let mut flagged = None;
        let original = rules(dec!(0.05), dec!(0.02));
        let (adjusted, flag) = apply_trailing_floor(original.clone(), dec!(0.02), &mut flagged);

        assert!(!flag);
        assert_eq!(adjusted, original);
        assert!(flagged.is_none());

        let (_, flag) = apply_trailing_floor(ExitRuleConfig::default(), dec!(0.02), &mut flagged);
        assert!(!flag);
    }
}
