//! Stub implementations for testing.
//!
//! These implementations simulate collaborator behavior without any real
//! market, broker or configuration backend.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use precog_domain::{
    ExitRuleConfig, ExposureSnapshot, MarketSnapshot, OpenProposal, Position, PositionAction, PositionId, Price,
    RiskLimits, Ticker, UserId,
};
use precog_engine::{ConfidenceTier, ExitThresholdTable};

use crate::error::ExecError;
use crate::ports::{ExecutionPort, ExecutionReceipt, ExposurePort, MarketDataPort, RulesPort};

// =============================================================================
// Stub Market Data
// =============================================================================

/// Stub market data provider for testing.
///
/// Allows manual snapshot injection for testing scenarios.
pub struct StubMarketData {
    snapshots: RwLock<HashMap<Ticker, MarketSnapshot>>,
}

impl StubMarketData {
    /// Create a new stub market data provider.
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the snapshot for its ticker.
    pub async fn set_snapshot(&self, snapshot: MarketSnapshot) {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.ticker.clone(), snapshot);
    }

    /// Set a bare price observed now, keeping edge and predicates.
    pub async fn set_price(&self, ticker: &Ticker, price: Decimal) -> Result<(), ExecError> {
        let price = Price::new(price)?;
        let mut snapshots = self.snapshots.write().await;
        let snapshot = snapshots
            .entry(ticker.clone())
            .or_insert_with(|| MarketSnapshot::new(ticker.clone(), price, Utc::now()));
        snapshot.price = price;
        snapshot.observed_at = Utc::now();
        Ok(())
    }
}

impl Default for StubMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataPort for StubMarketData {
    async fn snapshot(&self, ticker: &Ticker) -> Result<MarketSnapshot, ExecError> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(ticker)
            .cloned()
            .ok_or_else(|| ExecError::MarketData(format!("No snapshot for {}", ticker)))
    }
}

// =============================================================================
// Stub Execution
// =============================================================================

/// A recorded submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAction {
    pub position_id: PositionId,
    pub action: PositionAction,
}

/// Stub execution collaborator.
///
/// Accepts every submission and records it, unless told to fail the next one.
pub struct StubExecution {
    submitted: RwLock<Vec<SubmittedAction>>,
    fail_next: RwLock<bool>,
}

impl StubExecution {
    pub fn new() -> Self {
        Self {
            submitted: RwLock::new(Vec::new()),
            fail_next: RwLock::new(false),
        }
    }

    /// Configure the next submission to fail.
    pub async fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().await = fail;
    }

    /// Everything submitted so far, in order.
    pub async fn submitted(&self) -> Vec<SubmittedAction> {
        self.submitted.read().await.clone()
    }

    async fn should_fail(&self) -> bool {
        let mut fail_next = self.fail_next.write().await;
        let fail = *fail_next;
        *fail_next = false; // Reset after check
        fail
    }
}

impl Default for StubExecution {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionPort for StubExecution {
    async fn submit(&self, position: &Position, action: &PositionAction) -> Result<ExecutionReceipt, ExecError> {
        if self.should_fail().await {
            return Err(ExecError::Submission("Simulated execution failure".to_string()));
        }

        self.submitted.write().await.push(SubmittedAction {
            position_id: position.id,
            action: action.clone(),
        });
        tracing::debug!(position_id = %position.id, action = action.kind(), "Stub: action accepted");

        Ok(ExecutionReceipt {
            submission_id: Uuid::now_v7(),
            position_id: position.id,
            accepted_at: Utc::now(),
        })
    }
}

// =============================================================================
// Stub Exposure
// =============================================================================

/// Stub exposure aggregator returning configured per-user snapshots.
pub struct StubExposure {
    by_user: RwLock<HashMap<UserId, ExposureSnapshot>>,
}

impl StubExposure {
    pub fn new() -> Self {
        Self {
            by_user: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_exposure(&self, user: UserId, exposure: ExposureSnapshot) {
        self.by_user.write().await.insert(user, exposure);
    }
}

impl Default for StubExposure {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExposurePort for StubExposure {
    async fn exposure(&self, user: UserId, _proposal: &OpenProposal) -> Result<ExposureSnapshot, ExecError> {
        // Users with nothing configured have no exposure yet
        Ok(self.by_user.read().await.get(&user).cloned().unwrap_or_default())
    }
}

// =============================================================================
// Stub Rules
// =============================================================================

/// Stub configuration collaborator.
///
/// Serves one rule set to every position and per-user limits with a default.
/// Both are validated on every read, the way a real loader rejects
/// inconsistent configuration.
pub struct StubRules {
    default_limits: RiskLimits,
    limits: RwLock<HashMap<UserId, RiskLimits>>,
    exit_rules: RwLock<ExitRuleConfig>,
    thresholds: Option<(ExitThresholdTable, ConfidenceTier, Option<Duration>)>,
}

impl StubRules {
    pub fn new(default_limits: RiskLimits, exit_rules: ExitRuleConfig) -> Self {
        Self {
            default_limits,
            limits: RwLock::new(HashMap::new()),
            exit_rules: RwLock::new(exit_rules),
            thresholds: None,
        }
    }

    /// Resolve profit target and stop loss from a threshold table
    pub fn with_thresholds(
        mut self,
        table: ExitThresholdTable,
        tier: ConfidenceTier,
        time_remaining: Option<Duration>,
    ) -> Self {
        self.thresholds = Some((table, tier, time_remaining));
        self
    }

    pub async fn set_limits(&self, user: UserId, limits: RiskLimits) {
        self.limits.write().await.insert(user, limits);
    }

    pub async fn set_exit_rules(&self, rules: ExitRuleConfig) {
        *self.exit_rules.write().await = rules;
    }
}

impl Default for StubRules {
    fn default() -> Self {
        Self::new(RiskLimits::default(), ExitRuleConfig::default())
    }
}

#[async_trait]
impl RulesPort for StubRules {
    async fn limits(&self, user: UserId) -> Result<RiskLimits, ExecError> {
        let limits = self
            .limits
            .read()
            .await
            .get(&user)
            .cloned()
            .unwrap_or_else(|| self.default_limits.clone());
        limits
            .validate()
            .map_err(|e| ExecError::Config(format!("risk limits for user {}: {}", user, e)))?;
        Ok(limits)
    }

    async fn exit_rules(&self, position: &Position) -> Result<ExitRuleConfig, ExecError> {
        let mut rules = self.exit_rules.read().await.clone();

        if let Some((table, tier, remaining)) = &self.thresholds {
            rules = table.resolve(*tier, *remaining)?.apply_to(rules);
        }

        rules
            .validate()
            .map_err(|e| ExecError::Config(format!("exit rules for position {}: {}", position.id, e)))?;
        Ok(rules)
    }
}

// =============================================================================
// Tests
// =============================================================================
