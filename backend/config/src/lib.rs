//! `chatterbus-config` — runtime configuration for the event bus.
//!
//! Provides:
//! - Typed config schema (dispatch limits, logging)
//! - YAML read/write with atomic replace
//! - Default value application
//! - Validation with path-addressed messages

pub mod defaults;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::{BusConfig, DispatchConfig, LoggingConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load, apply defaults to, and validate a config file.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<BusConfig> {
    let config = apply_all_defaults(load_config(path).await?);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}
