//! Logging setup and span constructors.
//!
//! Flightdeck logs through `tracing`; applications install a subscriber once
//! at startup with [`init_logging`] or [`init_logging_with`].

use crate::config::LoggingConfig;
use crate::context::FlightId;
use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed logs for development.
    #[default]
    Pretty,
    /// JSON structured logs for production.
    Json,
}

/// Installs the global subscriber with an `info` default filter.
///
/// `RUST_LOG` overrides the filter. Returns false if a subscriber was already
/// installed, in which case nothing changes.
pub fn init_logging(format: LogFormat) -> bool {
    install(format, "info")
}

/// Installs the global subscriber from configuration.
///
/// `RUST_LOG` still takes precedence over the configured filter.
pub fn init_logging_with(config: &LoggingConfig) -> bool {
    install(config.format, &config.filter)
}

fn install(format: LogFormat, default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init(),
    };
    installed.is_ok()
}

/// Creates the span a flight runs in.
#[must_use]
pub fn flight_span(flight_id: &FlightId, flight_type: &str) -> Span {
    tracing::info_span!("flight", flight_id = %flight_id, flight_type = %flight_type)
}

/// Creates the span for runner operations such as submission and recovery.
#[must_use]
pub fn runner_span(operation: &str) -> Span {
    tracing::info_span!("runner", op = operation)
}
