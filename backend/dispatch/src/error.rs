use thiserror::Error;

use crate::types::{EventKey, HandlerShape, ListenerId};

/// Failure of a single deliver call against one stored callback.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The callback stored under an event name is not the shape that event publishes.
    #[error("handler shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        expected: HandlerShape,
        found: HandlerShape,
    },

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

/// Errors returned by registration and by a top-level trigger.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid event name '{0}': must be non-empty and contain no '#'")]
    InvalidEventName(String),

    #[error("event name '{0}' is reserved for a built-in handler shape")]
    ReservedEventName(String),

    #[error("listener {listener} on '{key}' failed: {source}")]
    Delivery {
        key: EventKey,
        listener: ListenerId,
        #[source]
        source: DeliveryError,
    },

    #[error("drain served {limit} triggers without emptying the queue; aborting")]
    DrainLimitExceeded { limit: usize },
}
