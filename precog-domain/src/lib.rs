//! Precog Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains entities, value objects, configuration snapshots and the pure
//! trailing stop arithmetic.

#![warn(clippy::all)]

// Public modules
pub mod actions;
pub mod entities;
pub mod events;
pub mod exit_rules;
pub mod limits;
pub mod market_data;
pub mod trailing;
pub mod value_objects;

// Re-export commonly used types
pub use actions::{ExitReason, PositionAction, Priority};
pub use entities::{OpenPosition, Position, PositionId, PositionStatus, UserId};
pub use events::Event;
pub use exit_rules::{CadenceConfig, ExitRuleConfig, PartialExitTier, ScalingConfig, TrailingStopConfig};
pub use limits::{ExposureSnapshot, OpenProposal, RiskLimits};
pub use market_data::{MarketSnapshot, MonitoringPredicates};
pub use trailing::{TrailingPhase, TrailingStopState};
pub use value_objects::{DomainError, EventId, Price, Side, Sport, Ticker};
