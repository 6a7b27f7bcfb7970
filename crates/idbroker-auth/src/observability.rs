//! Tracing setup for services embedding the broker.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from
//! [`LoggingConfig::level`]. It can be swapped at runtime through
//! [`apply_logging_level`], for example after a configuration reload.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::{ConfigError, LoggingConfig};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the global subscriber using the configured level.
pub fn init_tracing(config: &LoggingConfig) {
    init_tracing_with_level(&config.level);
}

/// Installs the global subscriber with `level` as the fallback filter.
///
/// Only the first call installs anything; later calls are ignored so tests
/// may call this freely.
pub fn init_tracing_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Replaces the active filter.
///
/// Does nothing if tracing was not initialised through this module.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if `level` is not a valid filter
/// directive.
pub fn apply_logging_level(level: &str) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| ConfigError::InvalidValue(format!("logging.level '{level}': {e}")))?;

    if let Some(handle) = FILTER_HANDLE.get() {
        handle
            .modify(|current| *current = filter)
            .map_err(|e| ConfigError::InvalidValue(format!("logging.level: {e}")))?;
    }
    Ok(())
}
