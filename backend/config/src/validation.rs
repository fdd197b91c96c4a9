//! Config validation with path-addressed error messages.

use crate::schema::BusConfig;
use thiserror::Error;

/// Level names accepted by the logging setup.
const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &BusConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_dispatch(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_dispatch(config: &BusConfig, report: &mut ValidationReport) {
    let Some(dispatch) = &config.dispatch else { return };
    if dispatch.drain_limit == Some(0) {
        report.error("dispatch.drainLimit", "Drain limit must be at least 1");
    }
    if dispatch.queue_warn_depth() > dispatch.drain_limit() {
        report.warn(
            "dispatch.queueWarnDepth",
            "Warn depth exceeds the drain limit; the warning can never fire",
        );
    }
}

fn validate_logging(config: &BusConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !KNOWN_LEVELS.contains(&level.to_lowercase().as_str()) {
            report.error(
                "logging.level",
                format!("Unknown level '{level}'; expected one of {}", KNOWN_LEVELS.join(", ")),
            );
        }
    }
}
