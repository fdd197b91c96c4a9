/// Event keys, listener ids, and the closed set of handler shapes.
///
/// Every event name has exactly one handler shape. The registry stores the
/// tagged `Callback` without looking inside it; the typed publishers match on
/// the tag when they deliver.
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chatterbus_core::{Channel, ProtocolMessage, TextMessage};
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, DispatchError};

// ---------------------------------------------------------------------------
// Built-in event names
// ---------------------------------------------------------------------------

/// Chat text posted to a channel.
pub const TEXT: &str = "TEXT";
/// Protocol notices that are not chat text.
pub const PROTOCOL: &str = "PROTOCOL";
/// The bot joined a channel.
pub const JOIN: &str = "JOIN";
/// The bot left a channel.
pub const PART: &str = "PART";

const BUILTIN_EVENTS: [&str; 4] = [TEXT, PROTOCOL, JOIN, PART];

/// Separator between an event name and its channel scope.
const SCOPE_SEPARATOR: char = '#';

pub(crate) fn validate_event_name(event: &str) -> Result<(), DispatchError> {
    if event.is_empty() || event.contains(SCOPE_SEPARATOR) {
        return Err(DispatchError::InvalidEventName(event.to_string()));
    }
    Ok(())
}

pub(crate) fn is_builtin_event(event: &str) -> bool {
    BUILTIN_EVENTS.contains(&event)
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Registration-order identity of a listener, unique within one dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry index: `NAME` for global listeners, `NAME#channel` for scoped ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey(String);

impl EventKey {
    pub fn global(event: &str) -> Self {
        Self(event.to_string())
    }

    pub fn scoped(event: &str, channel: &Channel) -> Self {
        Self(format!("{event}{SCOPE_SEPARATOR}{}", channel.name()))
    }

    pub fn new(event: &str, channel: Option<&Channel>) -> Self {
        match channel {
            Some(channel) => Self::scoped(event, channel),
            None => Self::global(event),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn event_name(&self) -> &str {
        self.split().0
    }

    /// The channel scope, or `None` for a global key.
    pub fn channel_name(&self) -> Option<&str> {
        self.split().1
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.0.split_once(SCOPE_SEPARATOR) {
            Some((event, channel)) => (event, Some(channel)),
            None => (&self.0, None),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Handler shapes
// ---------------------------------------------------------------------------

/// Tag of a stored callback, reported on shape mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerShape {
    Text,
    Protocol,
    Membership,
    Custom,
}

impl fmt::Display for HandlerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Protocol => "protocol",
            Self::Membership => "membership",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

pub type TextHandler = Arc<dyn Fn(&TextMessage) -> Result<()> + Send + Sync>;
pub type ProtocolHandler = Arc<dyn Fn(&ProtocolMessage) -> Result<()> + Send + Sync>;
/// Shared by `JOIN` and `PART`.
pub type MembershipHandler = Arc<dyn Fn(&Channel) -> Result<()> + Send + Sync>;
/// Plugin-defined events carry a JSON payload.
pub type CustomHandler = Arc<dyn Fn(&serde_json::Value) -> Result<()> + Send + Sync>;

/// A stored listener callback, tagged by shape.
#[derive(Clone)]
pub enum Callback {
    Text(TextHandler),
    Protocol(ProtocolHandler),
    Membership(MembershipHandler),
    Custom(CustomHandler),
}

impl Callback {
    pub fn text(handler: impl Fn(&TextMessage) -> Result<()> + Send + Sync + 'static) -> Self {
        Self::Text(Arc::new(handler))
    }

    pub fn protocol(
        handler: impl Fn(&ProtocolMessage) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::Protocol(Arc::new(handler))
    }

    pub fn membership(handler: impl Fn(&Channel) -> Result<()> + Send + Sync + 'static) -> Self {
        Self::Membership(Arc::new(handler))
    }

    pub fn custom(
        handler: impl Fn(&serde_json::Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(Arc::new(handler))
    }

    pub fn shape(&self) -> HandlerShape {
        match self {
            Self::Text(_) => HandlerShape::Text,
            Self::Protocol(_) => HandlerShape::Protocol,
            Self::Membership(_) => HandlerShape::Membership,
            Self::Custom(_) => HandlerShape::Custom,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback::{:?}", self.shape())
    }
}

/// Call-site capability that invokes one stored callback with the payload being published.
pub type Deliver = Box<dyn Fn(&Callback) -> Result<(), DeliveryError> + Send + Sync>;
