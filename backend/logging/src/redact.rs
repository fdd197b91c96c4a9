//! Log Redaction Layer
//!
//! Scrubs chat credentials (OAuth tokens, `PASS` lines, bearer tokens) from
//! strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static OAUTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)oauth:[a-z0-9]+").expect("valid oauth regex"));
static PASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^PASS\s+\S+").expect("valid PASS regex"));
static BEARER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").expect("valid bearer regex")
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = OAUTH_RE.replace_all(input, "oauth:[REDACTED]");
    let redacted = PASS_RE.replace_all(&redacted, "PASS [REDACTED]");
    BEARER_RE
        .replace_all(&redacted, "Bearer [REDACTED]")
        .into_owned()
}
