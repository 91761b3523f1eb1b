//! Tracing subscriber initialisation for the binary.

use std::io::{self, IsTerminal};
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "info";

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(String),
}

/// Installs a global `fmt` subscriber writing to stderr.
///
/// The filter comes from `filter` if given, otherwise `RUST_LOG`, otherwise
/// `info`. Only the first call installs anything; later calls return `Ok(())`.
///
/// # Errors
/// Returns [`TelemetryError`] if the filter is invalid or another subscriber
/// is already installed globally.
pub fn initialise(filter: Option<&str>) -> Result<(), TelemetryError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }

    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER)),
    }
    .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|error| TelemetryError::Subscriber(error.to_string()))?;

    let _ = TELEMETRY_GUARD.set(());
    Ok(())
}
