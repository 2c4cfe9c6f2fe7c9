//! Tracing subscriber setup.
//!
//! The git layer logs through `log`; everything else emits `tracing` events.
//! [`init_tracing`] installs one subscriber for both.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingSettings};
use crate::error::RocketeerError;

/// Builds the filter: `RUST_LOG` if set and valid, the configured directives otherwise.
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter, RocketeerError> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(&settings.filter).map_err(|e| {
        RocketeerError::Telemetry(format!("Invalid log filter '{}': {}", settings.filter, e))
    })
}

/// Installs the global subscriber and bridges `log` records into it.
///
/// Fails if a global subscriber or logger is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), RocketeerError> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(true)))
        }
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        ),
    };
    installed.map_err(|e| RocketeerError::Telemetry(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| RocketeerError::Telemetry(e.to_string()))?;
    Ok(())
}
