//! Precog Collaborator Ports
//!
//! Interfaces to everything outside the engine.
//!
//! # Architecture
//!
//! ```text
//! Market Data ─┐                       ┌─> Execution
//! Exposure    ─┼─> Daemon ─> Engine ───┤
//! Rules       ─┘                       └─> Store (audit)
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for market data, execution, exposure and configuration
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust,ignore
//! use precog_exec::{MarketDataPort, StubMarketData};
//!
//! let market_data = StubMarketData::new();
//! market_data.set_price(&ticker, dec!(0.56)).await?;
//! let snapshot = market_data.snapshot(&ticker).await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod ports;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult};
pub use ports::{ExecutionPort, ExecutionReceipt, ExposurePort, MarketDataPort, RulesPort};
pub use stub::{StubExecution, StubExposure, StubMarketData, StubRules, SubmittedAction};
