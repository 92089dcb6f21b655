//! Position Actions
//!
//! The single output of one monitoring cycle.

use crate::value_objects::{validate_unit_fraction, DomainError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency of an action, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Why an exit was recommended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Favorable move reached the profit target
    ProfitTarget,
    /// Adverse move reached the stop loss
    StopLoss,
    /// Price crossed the trailing stop
    TrailingStop,
    /// Model edge fell below the early-exit threshold
    EdgeDecay,
    /// A partial-exit tier was reached
    PartialTarget,
}

impl ExitReason {
    /// Stable name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            ExitReason::ProfitTarget => "profit_target",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::EdgeDecay => "edge_decay",
            ExitReason::PartialTarget => "partial_target",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Recommended action for one position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PositionAction {
    /// No action this cycle
    Hold { message: String },

    /// Close the whole position
    ExitFull {
        reason: ExitReason,
        /// Names the threshold crossed and the observed values
        detail: String,
        priority: Priority,
    },

    /// Close `exit_fraction` of the position
    ExitPartial {
        reason: ExitReason,
        detail: String,
        exit_fraction: Decimal,
        priority: Priority,
    },

    /// Add `add_fraction` to the position
    ScaleIn { add_fraction: Decimal, detail: String },

    /// Reduce the position by `reduce_fraction`
    ScaleOut { reduce_fraction: Decimal, detail: String },

    /// Guard failure (missing, foreign, closed, or mismatched position)
    Error { reason: String },
}

impl PositionAction {
    /// Hold with a message
    pub fn hold(message: impl Into<String>) -> Self {
        PositionAction::Hold {
            message: message.into(),
        }
    }

    /// Full exit
    pub fn exit_full(reason: ExitReason, detail: impl Into<String>, priority: Priority) -> Self {
        PositionAction::ExitFull {
            reason,
            detail: detail.into(),
            priority,
        }
    }

    /// Partial exit
    ///
    /// # Errors
    /// Returns `DomainError::InvalidFraction` unless `exit_fraction` is in (0, 1].
    pub fn exit_partial(
        reason: ExitReason,
        detail: impl Into<String>,
        exit_fraction: Decimal,
        priority: Priority,
    ) -> Result<Self, DomainError> {
        Ok(PositionAction::ExitPartial {
            reason,
            detail: detail.into(),
            exit_fraction: validate_unit_fraction("exit_fraction", exit_fraction)?,
            priority,
        })
    }

    /// Scale in
    ///
    /// # Errors
    /// Returns `DomainError::InvalidFraction` unless `add_fraction` is in (0, 1].
    pub fn scale_in(add_fraction: Decimal, detail: impl Into<String>) -> Result<Self, DomainError> {
        Ok(PositionAction::ScaleIn {
            add_fraction: validate_unit_fraction("add_fraction", add_fraction)?,
            detail: detail.into(),
        })
    }

    /// Scale out
    ///
    /// # Errors
    /// Returns `DomainError::InvalidFraction` unless `reduce_fraction` is in (0, 1].
    pub fn scale_out(reduce_fraction: Decimal, detail: impl Into<String>) -> Result<Self, DomainError> {
        Ok(PositionAction::ScaleOut {
            reduce_fraction: validate_unit_fraction("reduce_fraction", reduce_fraction)?,
            detail: detail.into(),
        })
    }

    /// Guard error
    pub fn error(reason: impl Into<String>) -> Self {
        PositionAction::Error {
            reason: reason.into(),
        }
    }

    /// Stable kind name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PositionAction::Hold { .. } => "hold",
            PositionAction::ExitFull { .. } => "exit_full",
            PositionAction::ExitPartial { .. } => "exit_partial",
            PositionAction::ScaleIn { .. } => "scale_in",
            PositionAction::ScaleOut { .. } => "scale_out",
            PositionAction::Error { .. } => "error",
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, PositionAction::Hold { .. })
    }

    /// Full or partial exit
    pub fn is_exit(&self) -> bool {
        matches!(self, PositionAction::ExitFull { .. } | PositionAction::ExitPartial { .. })
    }

    /// Exit reason, for exit actions
    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self {
            PositionAction::ExitFull { reason, .. } | PositionAction::ExitPartial { reason, .. } => {
                Some(*reason)
            },
            _ => None,
        }
    }

    /// Priority, for exit actions
    pub fn priority(&self) -> Option<Priority> {
        match self {
            PositionAction::ExitFull { priority, .. } | PositionAction::ExitPartial { priority, .. } => {
                Some(*priority)
            },
            _ => None,
        }
    }
}

impl fmt::Display for PositionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionAction::Hold { message } => write!(f, "hold: {}", message),
            PositionAction::ExitFull { reason, detail, priority } => {
                write!(f, "exit full ({}, {}): {}", reason, priority, detail)
            },
            PositionAction::ExitPartial { reason, detail, exit_fraction, priority } => write!(
                f,
                "exit {} ({}, {}): {}",
                exit_fraction, reason, priority, detail
            ),
            PositionAction::ScaleIn { add_fraction, detail } => {
                write!(f, "scale in {}: {}", add_fraction, detail)
            },
            PositionAction::ScaleOut { reduce_fraction, detail } => {
                write!(f, "scale out {}: {}", reduce_fraction, detail)
            },
            PositionAction::Error { reason } => write!(f, "error: {}", reason),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
