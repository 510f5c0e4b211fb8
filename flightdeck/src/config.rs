//! Configuration for the runner, retry policies and logging.
//!
//! Everything deserializes from JSON with defaults for missing fields:
//!
//! ```json
//! {
//!   "runner": { "max_concurrent_flights": 8 },
//!   "lock_retry": { "kind": "random_backoff", "interval_ms": 500, "max_count": 5 },
//!   "logging": { "format": "json" }
//! }
//! ```

use crate::observability::LogFormat;
use crate::retry::{JitterStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid configuration JSON.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid value for {field}: {message}")]
    Invalid {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightdeckConfig {
    /// Flight runner settings.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Retry policy for lock and unlock steps.
    #[serde(default = "RetryConfig::lock_default")]
    pub lock_retry: RetryConfig,
    /// Retry policy for every other step.
    #[serde(default)]
    pub step_retry: RetryConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for FlightdeckConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            lock_retry: RetryConfig::lock_default(),
            step_retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FlightdeckConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Sets the runner settings.
    #[must_use]
    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Sets the lock step retry settings.
    #[must_use]
    pub fn with_lock_retry(mut self, retry: RetryConfig) -> Self {
        self.lock_retry = retry;
        self
    }

    /// Sets the retry settings for other steps.
    #[must_use]
    pub fn with_step_retry(mut self, retry: RetryConfig) -> Self {
        self.step_retry = retry;
        self
    }

    /// Sets the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.max_concurrent_flights == 0 {
            return Err(ConfigError::invalid(
                "runner.max_concurrent_flights",
                "must be at least 1",
            ));
        }
        self.lock_retry.validate("lock_retry")?;
        self.step_retry.validate("step_retry")
    }
}

/// Flight runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Size of the worker pool; further submissions queue.
    #[serde(default = "default_max_concurrent_flights")]
    pub max_concurrent_flights: u32,
}

fn default_max_concurrent_flights() -> u32 {
    4
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_flights: default_max_concurrent_flights(),
        }
    }
}

impl RunnerConfig {
    /// Sets the worker pool size.
    #[must_use]
    pub fn with_max_concurrent_flights(mut self, max: u32) -> Self {
        self.max_concurrent_flights = max;
        self
    }
}

/// The shape of a configured retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    /// Single attempt.
    None,
    /// Constant interval.
    Fixed,
    /// Doubling interval bounded by an operation time budget.
    #[default]
    Exponential,
    /// Interval times a random factor up to the worker-pool size.
    RandomBackoff,
}

/// Serializable form of a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Policy shape.
    #[serde(default)]
    pub kind: RetryKind,
    /// Fixed interval, exponential initial delay or random backoff increment.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Cap on one exponential delay.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Exponential time budget.
    #[serde(default = "default_max_operation_time_ms")]
    pub max_operation_time_ms: u64,
    /// Total attempts for fixed and random backoff.
    #[serde(default = "default_max_count")]
    pub max_count: u32,
    /// Jitter for exponential delays.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_interval_ms() -> u64 {
    100
}

fn default_max_interval_ms() -> u64 {
    10_000
}

fn default_max_operation_time_ms() -> u64 {
    60_000
}

fn default_max_count() -> u32 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            kind: RetryKind::default(),
            interval_ms: default_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_operation_time_ms: default_max_operation_time_ms(),
            max_count: default_max_count(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// The default lock policy: 500ms random backoff, five attempts.
    #[must_use]
    pub fn lock_default() -> Self {
        Self {
            kind: RetryKind::RandomBackoff,
            interval_ms: 500,
            ..Self::default()
        }
    }

    /// Sets the policy shape.
    #[must_use]
    pub fn with_kind(mut self, kind: RetryKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the base interval.
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    /// Builds the runtime policy. `pool_size` scales random backoff.
    #[must_use]
    pub fn to_policy(&self, pool_size: u32) -> RetryPolicy {
        let interval = Duration::from_millis(self.interval_ms);
        match self.kind {
            RetryKind::None => RetryPolicy::None,
            RetryKind::Fixed => RetryPolicy::fixed(interval, self.max_count),
            RetryKind::Exponential => RetryPolicy::exponential(
                interval,
                Duration::from_millis(self.max_interval_ms),
                Duration::from_millis(self.max_operation_time_ms),
            )
            .with_jitter(self.jitter),
            RetryKind::RandomBackoff => {
                RetryPolicy::random_backoff(interval, pool_size, self.max_count)
            }
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        match self.kind {
            RetryKind::Fixed | RetryKind::RandomBackoff if self.max_count == 0 => Err(
                ConfigError::invalid(&format!("{section}.max_count"), "must be at least 1"),
            ),
            RetryKind::Exponential if self.max_interval_ms < self.interval_ms => {
                Err(ConfigError::invalid(
                    &format!("{section}.max_interval_ms"),
                    "must not be below interval_ms",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directives; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = FlightdeckConfig::new();
        assert_eq!(config.runner.max_concurrent_flights, 4);
        assert_eq!(config.lock_retry.kind, RetryKind::RandomBackoff);
        assert_eq!(config.step_retry.kind, RetryKind::Exponential);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_matches_defaults() {
        let parsed = FlightdeckConfig::from_json_str("{}").unwrap();
        assert_eq!(parsed, FlightdeckConfig::new());
    }

    #[test]
    fn test_partial_document() {
        let parsed = FlightdeckConfig::from_json_str(
            r#"{
                "runner": {"max_concurrent_flights": 16},
                "step_retry": {"kind": "fixed", "interval_ms": 10, "max_count": 3},
                "logging": {"format": "json"}
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.runner.max_concurrent_flights, 16);
        assert_eq!(
            parsed.step_retry.to_policy(16),
            RetryPolicy::fixed(Duration::from_millis(10), 3)
        );
        assert_eq!(parsed.logging.format, LogFormat::Json);
        assert_eq!(parsed.logging.filter, "info");
    }

    #[test]
    fn test_validation_errors() {
        let zero_pool = FlightdeckConfig::new().with_runner(RunnerConfig::default().with_max_concurrent_flights(0));
        assert!(matches!(
            zero_pool.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "runner.max_concurrent_flights"
        ));

        let zero_attempts = FlightdeckConfig::new()
            .with_lock_retry(RetryConfig::lock_default().with_max_count(0));
        assert!(matches!(
            zero_attempts.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "lock_retry.max_count"
        ));

        assert!(matches!(
            FlightdeckConfig::from_json_str(r#"{"runner": {"max_concurrent_flights": "many"}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_to_policy_scales_random_backoff() {
        let policy = RetryConfig::lock_default().to_policy(8);
        assert_eq!(
            policy,
            RetryPolicy::random_backoff(Duration::from_millis(500), 8, 5)
        );
        assert_eq!(
            RetryConfig::default().with_kind(RetryKind::None).to_policy(8),
            RetryPolicy::None
        );
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flightdeck.json");
        std::fs::write(
            &path,
            r#"{"lock_retry": {"kind": "fixed", "interval_ms": 250, "max_count": 8}}"#,
        )
        .unwrap();

        let config = FlightdeckConfig::from_file(&path).unwrap();
        assert_eq!(
            config.lock_retry.to_policy(4),
            RetryPolicy::fixed(Duration::from_millis(250), 8)
        );
        assert_eq!(config.runner, RunnerConfig::default());
    }

    #[test]
    fn test_from_missing_file() {
        let err = FlightdeckConfig::from_file("/nonexistent/flightdeck.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/flightdeck.json"));
    }
}
