//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use precog_domain::CadenceConfig;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Monitoring cadence
    pub cadence: CadenceConfig,

    /// Worker and bus sizing
    pub runtime: RuntimeConfig,

    /// Lowest trailing distance any exit rule set may use (0.02 = 2%)
    pub min_trailing_distance: Decimal,

    /// Emit JSON logs
    pub log_json: bool,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Runtime sizing.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bounded inbox capacity per position worker
    pub worker_inbox_capacity: usize,
    /// Broadcast buffer of the event bus
    pub event_bus_capacity: usize,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let cadence = Self::load_cadence_config()?;
        let runtime = Self::load_runtime_config()?;
        let min_trailing_distance =
            Self::load_decimal_env("PRECOG_MIN_TRAILING_DISTANCE", Decimal::new(2, 2))?;
        if min_trailing_distance <= Decimal::ZERO {
            return Err(DaemonError::Config(format!(
                "Invalid PRECOG_MIN_TRAILING_DISTANCE: {} must be positive",
                min_trailing_distance
            )));
        }
        let log_json = Self::load_bool_env("PRECOG_LOG_JSON", false)?;

        Ok(Self {
            cadence,
            runtime,
            min_trailing_distance,
            log_json,
            environment,
        })
    }

    /// Create test configuration.
    ///
    /// Cadence intervals are short so workers poll quickly under test.
    pub fn test() -> Self {
        Self {
            cadence: CadenceConfig {
                critical: Duration::from_millis(50),
                default: Duration::from_millis(200),
                slow: Duration::from_millis(400),
                swing_threshold: Decimal::new(10, 2),
            },
            runtime: RuntimeConfig {
                worker_inbox_capacity: 16,
                event_bus_capacity: 100,
            },
            min_trailing_distance: Decimal::new(2, 2),
            log_json: false,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("PRECOG_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid PRECOG_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_cadence_config() -> DaemonResult<CadenceConfig> {
        let defaults = CadenceConfig::default();

        let critical = Self::load_secs_env("PRECOG_CADENCE_CRITICAL_SECS", defaults.critical)?;
        let default = Self::load_secs_env("PRECOG_CADENCE_DEFAULT_SECS", defaults.default)?;
        let slow = Self::load_secs_env("PRECOG_CADENCE_SLOW_SECS", defaults.slow)?;

        if !(critical <= default && default <= slow) {
            return Err(DaemonError::Config(format!(
                "Cadence intervals must satisfy critical <= default <= slow, got {:?} / {:?} / {:?}",
                critical, default, slow
            )));
        }

        Ok(CadenceConfig {
            critical,
            default,
            slow,
            swing_threshold: defaults.swing_threshold,
        })
    }

    fn load_runtime_config() -> DaemonResult<RuntimeConfig> {
        Ok(RuntimeConfig {
            worker_inbox_capacity: Self::load_capacity_env("PRECOG_WORKER_INBOX_CAPACITY", 64)?,
            event_bus_capacity: Self::load_capacity_env("PRECOG_EVENT_BUS_CAPACITY", 1000)?,
        })
    }

    fn load_decimal_env(key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match env::var(key) {
            Ok(val) => Decimal::from_str(&val)
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn load_secs_env(key: &str, default: Duration) -> DaemonResult<Duration> {
        match env::var(key) {
            Ok(val) => match val.parse::<u64>() {
                Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                _ => Err(DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            },
            Err(_) => Ok(default),
        }
    }

    fn load_capacity_env(key: &str, default: usize) -> DaemonResult<usize> {
        match env::var(key) {
            Ok(val) => match val.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            },
            Err(_) => Ok(default),
        }
    }

    fn load_bool_env(key: &str, default: bool) -> DaemonResult<bool> {
        match env::var(key) {
            Ok(val) => match val.to_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            },
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cadence: CadenceConfig::default(),
            runtime: RuntimeConfig {
                worker_inbox_capacity: 64,
                event_bus_capacity: 1000,
            },
            min_trailing_distance: Decimal::new(2, 2), // 2%
            log_json: false,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.cadence.critical, Duration::from_secs(15));
        assert_eq!(config.cadence.default, Duration::from_secs(60));
        assert_eq!(config.cadence.slow, Duration::from_secs(120));
        assert_eq!(config.runtime.worker_inbox_capacity, 64);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert!(config.cadence.critical < config.cadence.default);
        assert_eq!(config.min_trailing_distance, dec!(0.02));
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
