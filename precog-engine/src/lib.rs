//! Precog Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes position and market snapshots → Returns decisions and new snapshots.

#![warn(clippy::all)]

pub mod cadence;
pub mod error;
pub mod monitor;
pub mod risk_gate;
pub mod thresholds;
pub mod tracker;

pub use cadence::{select_band, MonitoringBand};
pub use error::{EngineError, EngineResult};
pub use monitor::{Evaluation, EvaluationRequest, PositionMonitor};
pub use risk_gate::{RiskCheck, RiskDecision, RiskGate, RiskRejection};
pub use thresholds::{ConfidenceMultipliers, ConfidenceTier, ExitThresholdTable, ResolvedThresholds, TimeBand};
pub use tracker::{TrailingStopTracker, TrailingUpdate, TriggerReason};
