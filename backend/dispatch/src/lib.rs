//! In-process event bus for chat bot plugins.
//!
//! Plugins subscribe to named events, optionally scoped to one channel, and
//! the bot core publishes without knowing who listens. Triggers raised from
//! inside a listener are queued and served by the outermost drain loop, so
//! arbitrarily long chains run breadth-first at constant stack depth.

pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod queue;
pub mod registry;
pub mod typed;
pub mod types;

pub use dispatcher::{Dispatcher, WeakDispatcher};
pub use error::{DeliveryError, DispatchError};
pub use listener::Listener;
pub use types::{
    Callback, CustomHandler, Deliver, EventKey, HandlerShape, ListenerId, MembershipHandler,
    ProtocolHandler, TextHandler, JOIN, PART, PROTOCOL, TEXT,
};
