//! Chat-side types consumed by the chatterbus dispatcher.
//!
//! The chat-protocol client produces these; plugins receive them through
//! the dispatcher's typed handlers.

pub mod channel;
pub mod error;
pub mod message;

pub use channel::Channel;
pub use error::CoreError;
pub use message::{ProtocolMessage, TextMessage};
