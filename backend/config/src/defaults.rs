//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{BusConfig, DispatchConfig, LoggingConfig};

/// Default cap on triggers served by one top-level drain.
pub const DEFAULT_DRAIN_LIMIT: usize = 100_000;

/// Default pending-queue length that triggers a warning.
pub const DEFAULT_QUEUE_WARN_DEPTH: usize = 1_000;

/// Default log level filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: BusConfig) -> BusConfig {
    let config = apply_dispatch_defaults(config);
    apply_logging_defaults(config)
}

fn apply_dispatch_defaults(mut config: BusConfig) -> BusConfig {
    let dispatch = config.dispatch.get_or_insert_with(DispatchConfig::default);
    if dispatch.drain_limit.is_none() {
        dispatch.drain_limit = Some(DEFAULT_DRAIN_LIMIT);
    }
    if dispatch.queue_warn_depth.is_none() {
        dispatch.queue_warn_depth = Some(DEFAULT_QUEUE_WARN_DEPTH);
    }
    config
}

fn apply_logging_defaults(mut config: BusConfig) -> BusConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    if logging.redact_sensitive.is_none() {
        logging.redact_sensitive = Some(true);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_dispatch_limits() {
        let cfg = apply_all_defaults(BusConfig::default());
        let dispatch = cfg.dispatch.unwrap();
        assert_eq!(dispatch.drain_limit, Some(DEFAULT_DRAIN_LIMIT));
        assert_eq!(dispatch.queue_warn_depth, Some(DEFAULT_QUEUE_WARN_DEPTH));
    }

    #[test]
    fn applies_logging_level_and_redaction() {
        let cfg = apply_all_defaults(BusConfig::default());
        let logging = cfg.logging.unwrap();
        assert_eq!(logging.level.as_deref(), Some(DEFAULT_LOG_LEVEL));
        assert_eq!(logging.redact_sensitive, Some(true));
    }

    #[test]
    fn does_not_override_user_set_limit() {
        let cfg = BusConfig {
            dispatch: Some(DispatchConfig {
                drain_limit: Some(42),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.dispatch.unwrap().drain_limit, Some(42));
    }
}
