use thiserror::Error;

/// Errors raised while building chat-side values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid channel name '{0}': must be non-empty and contain no '#' or whitespace")]
    InvalidChannelName(String),
}
