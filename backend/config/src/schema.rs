//! chatterbus configuration schema.
//!
//! Every field is optional on disk; `defaults::apply_all_defaults` fills the
//! gaps after loading.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::defaults::{DEFAULT_DRAIN_LIMIT, DEFAULT_QUEUE_WARN_DEPTH};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the event bus and its logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    /// Trigger queue settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Max triggers one top-level drain may serve before it is aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_limit: Option<usize>,
    /// Pending-queue length at which a drain logs a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_warn_depth: Option<usize>,
}

impl DispatchConfig {
    /// Effective drain limit. Zero would fail every trigger, so it means "unset".
    pub fn drain_limit(&self) -> usize {
        self.drain_limit
            .filter(|&limit| limit > 0)
            .unwrap_or(DEFAULT_DRAIN_LIMIT)
    }

    pub fn queue_warn_depth(&self) -> usize {
        self.queue_warn_depth.unwrap_or(DEFAULT_QUEUE_WARN_DEPTH)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for daily-rolling NDJSON logs; console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Scrub tokens and passwords from chat text before it is traced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redact_sensitive: Option<bool>,
}

impl LoggingConfig {
    pub fn redact_sensitive(&self) -> bool {
        self.redact_sensitive.unwrap_or(true)
    }
}
