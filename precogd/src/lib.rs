//! Precog Daemon Library
//!
//! Runtime orchestrator for the Precog position risk and exit engine.
//!
//! # Architecture
//!
//! ```text
//! propose_open → Risk Gate → Store (audit)
//!
//! Market Data → Position Worker (one per position) → Position Monitor
//!                    │                                   │
//!                    ├─ Store (snapshot + audit)  <──────┘
//!                    ├─ Execution (non-hold actions)
//!                    └─ Event Bus (actions, degraded alerts)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Position Worker**: Single writer per open position
//! - **Event Bus**: Internal fan-out of actions and decisions
//! - **Metrics**: Prometheus counters
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use precogd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_stub(config).expect("Failed to build daemon");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod event_bus;
pub mod metrics;
pub mod worker;

// Re-exports for convenience
pub use config::{Config, Environment, RuntimeConfig};
pub use daemon::{Collaborators, Daemon, OpenOutcome};
pub use error::{DaemonError, DaemonResult};
pub use event_bus::{DaemonEvent, EventBus, EventReceiver, OpenDecision};
pub use metrics::Metrics;
pub use worker::{
    PositionWorker, WorkerCommand, WorkerContext, WorkerExit, WorkerHandle, WorkerMailbox, WorkerReport,
};
