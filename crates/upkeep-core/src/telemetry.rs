//! Logging bootstrap

use crate::config::LoggingConfig;
use crate::error::ConfigError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter: `RUST_LOG` when set, the configured directive otherwise
///
/// # Errors
/// [`ConfigError::InvalidLogFilter`] when the configured directive is malformed.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidLogFilter {
        filter: config.filter.clone(),
        reason: e.to_string(),
    })
}

/// Install the global `tracing` subscriber
///
/// Returns `false` when a subscriber was already installed, which happens
/// when tests or the host set one up first.
///
/// # Errors
/// [`ConfigError::InvalidLogFilter`] when the configured directive is malformed.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json()).try_init().is_ok()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init().is_ok()
    };

    if installed {
        tracing::debug!(filter = %config.filter, json = config.json, "tracing initialized");
    }
    Ok(installed)
}
