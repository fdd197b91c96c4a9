//! Structured logging setup and log redaction for chatterbus.

pub mod logger;
pub mod redact;

pub use logger::{build_filter, init_logger};
pub use redact::redact_sensitive_data;
