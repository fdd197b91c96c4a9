//! Structured Logger
//!
//! Wraps `tracing` with a console layer, an optional daily-rolling NDJSON
//! file layer, and environment-based level control.

use anyhow::Result;
use chatterbus_config::LoggingConfig;
use chatterbus_config::defaults::DEFAULT_LOG_LEVEL;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file prefix inside the configured directory.
const LOG_FILE_PREFIX: &str = "chatterbus.log";

/// Resolve the level filter: `RUST_LOG` wins over the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = config.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
    Ok(EnvFilter::try_new(level)?)
}

/// Initialize the global structured logger.
///
/// Installing twice is harmless; the second call leaves the first subscriber in place.
pub fn init_logger(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_filter(config)?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    // Rolling file appender: writes NDJSON to `<dir>/chatterbus.log.YYYY-MM-DD`
    let file_layer = config.directory.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(())
}
