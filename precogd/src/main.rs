//! Precog Daemon
//!
//! Runtime orchestrator for risk admission and position monitoring.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p precogd
//!
//! # Start with custom environment
//! PRECOG_ENV=test PRECOG_CADENCE_CRITICAL_SECS=5 cargo run -p precogd
//! ```
//!
//! # Environment Variables
//!
//! - `PRECOG_ENV`: Environment (test, development, production)
//! - `PRECOG_CADENCE_CRITICAL_SECS`: Critical band interval (default: 15)
//! - `PRECOG_CADENCE_DEFAULT_SECS`: Default band interval (default: 60)
//! - `PRECOG_CADENCE_SLOW_SECS`: Slow band interval (default: 120)
//! - `PRECOG_WORKER_INBOX_CAPACITY`: Per-position inbox size (default: 64)
//! - `PRECOG_EVENT_BUS_CAPACITY`: Event bus buffer (default: 1000)
//! - `PRECOG_MIN_TRAILING_DISTANCE`: Trailing distance floor (default: 0.02)
//! - `PRECOG_LOG_JSON`: JSON log output (default: false)

use precogd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("precogd=info".parse()?);
    if config.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        critical_secs = config.cadence.critical.as_secs(),
        default_secs = config.cadence.default.as_secs(),
        slow_secs = config.cadence.slow.as_secs(),
        "Precog Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new_stub(config)?;
    daemon.run().await?;

    Ok(())
}
