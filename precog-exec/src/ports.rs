//! Collaborator port definitions.
//!
//! Ports define the interfaces for external services (market data, order
//! execution, exposure aggregation, configuration). The engine itself never
//! calls these; the daemon fetches inputs through them and hands results back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use precog_domain::{
    ExitRuleConfig, ExposureSnapshot, MarketSnapshot, OpenProposal, Position, PositionAction, PositionId,
    RiskLimits, Ticker, UserId,
};

use crate::error::ExecError;

// =============================================================================
// Market Data Port
// =============================================================================

/// Port for current market state.
///
/// Implementations:
/// - `StubMarketData` - For testing (settable snapshots)
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Current price, edge and monitoring predicates for a ticker.
    async fn snapshot(&self, ticker: &Ticker) -> Result<MarketSnapshot, ExecError>;
}

// =============================================================================
// Execution Port
// =============================================================================

/// Port for acting on recommended actions.
///
/// The execution collaborator places orders, closes positions and records
/// realized P&L. Submissions are advisory from the engine's point of view.
///
/// Implementations:
/// - `StubExecution` - For testing (records submissions)
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    /// Submit a non-hold action for a position.
    async fn submit(&self, position: &Position, action: &PositionAction) -> Result<ExecutionReceipt, ExecError>;
}

/// Acknowledgement of a submitted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Collaborator-assigned submission ID
    pub submission_id: Uuid,
    /// Position the action targets
    pub position_id: PositionId,
    /// When the submission was accepted
    pub accepted_at: DateTime<Utc>,
}

// =============================================================================
// Exposure Port
// =============================================================================

/// Port for pre-aggregated exposure figures.
#[async_trait]
pub trait ExposurePort: Send + Sync {
    /// Exposure aggregates relevant to a proposal (total, its sport, its
    /// event, correlated positions, realized P&L windows).
    async fn exposure(&self, user: UserId, proposal: &OpenProposal) -> Result<ExposureSnapshot, ExecError>;
}

// =============================================================================
// Rules Port
// =============================================================================

/// Port for resolved configuration snapshots.
#[async_trait]
pub trait RulesPort: Send + Sync {
    /// Risk limits for a user.
    async fn limits(&self, user: UserId) -> Result<RiskLimits, ExecError>;

    /// Effective exit rules for a position.
    async fn exit_rules(&self, position: &Position) -> Result<ExitRuleConfig, ExecError>;
}
