//! Log subscriber setup.
//!
//! The bridge itself only emits `tracing` events. Hosts that have no
//! subscriber of their own can install this one: human-readable lines on
//! stderr, filtered by `RUST_LOG`.

use std::io::{self, IsTerminal};

use tracing_subscriber::EnvFilter;

use crate::error::{BridgeError, Result};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install a stderr subscriber filtered by `RUST_LOG`.
///
/// Idempotent: if a global subscriber is already installed, this is a no-op.
/// An unparseable `RUST_LOG` falls back to [`DEFAULT_FILTER`].
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Install a stderr subscriber with an explicit filter directive.
///
/// # Errors
///
/// Returns `InvalidConfig` if `directive` is not a valid filter.
pub fn init_with_filter(directive: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directive)
        .map_err(|e| BridgeError::InvalidConfig(format!("invalid log filter: {}", e)))?;
    install(filter);
    Ok(())
}

fn install(filter: EnvFilter) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init();

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}
