//! Pool configuration

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::target::{validate_poll_interval, DEFAULT_POLL_INTERVAL};

/// Pool configuration
///
/// # Example
///
/// ```
/// use elastic_pool::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new(10)
///     .with_poll_interval(Duration::from_millis(100))
///     .with_shutdown_timeout(Duration::from_secs(5));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Initial number of workers the pool converges to
    pub expected_count: u64,

    /// Reconcile cadence (minimum 1ms)
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// How long `shutdown` waits for workers to return
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            expected_count: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given target worker count
    pub fn new(expected_count: u64) -> Self {
        Self {
            expected_count,
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `ELASTIC_POOL_EXPECTED_COUNT`: target worker count (default: 0)
    /// - `ELASTIC_POOL_POLL_INTERVAL_MS`: reconcile cadence in ms (default: 1000)
    /// - `ELASTIC_POOL_SHUTDOWN_TIMEOUT_MS`: shutdown drain timeout in ms (default: 30000)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let expected_count =
            parse_env("ELASTIC_POOL_EXPECTED_COUNT")?.unwrap_or(defaults.expected_count);
        let poll_interval = parse_env("ELASTIC_POOL_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let shutdown_timeout = parse_env("ELASTIC_POOL_SHUTDOWN_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.shutdown_timeout);

        let config = Self {
            expected_count,
            poll_interval,
            shutdown_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the target worker count
    pub fn with_expected_count(mut self, count: u64) -> Self {
        self.expected_count = count;
        self
    }

    /// Set the reconcile cadence
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the shutdown drain timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_poll_interval(self.poll_interval)
    }
}

fn parse_env(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(value) => parse_value(key, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| PoolError::config(format!("{}={:?}: {}", key, value, e)))
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
