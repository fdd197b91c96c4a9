/// Typed subscribe/publish wrappers over the generic dispatcher.
///
/// Each `on_*` stores the one handler shape valid for its event name; each
/// publisher delivers only to that shape and reports anything else as
/// `DeliveryError::ShapeMismatch`.
use std::borrow::Cow;
use std::sync::Arc;

use anyhow::Result;
use chatterbus_core::{Channel, ProtocolMessage, TextMessage};
use chatterbus_logging::redact_sensitive_data;
use serde_json::Value;
use tracing::{debug, trace};

use crate::dispatcher::Dispatcher;
use crate::error::{DeliveryError, DispatchError};
use crate::listener::Listener;
use crate::types::{
    Callback, EventKey, HandlerShape, JOIN, PART, PROTOCOL, TEXT, is_builtin_event,
    validate_event_name,
};

fn mismatch(expected: HandlerShape, found: &Callback) -> DeliveryError {
    DeliveryError::ShapeMismatch {
        expected,
        found: found.shape(),
    }
}

fn check_custom_event(event: &str) -> Result<(), DispatchError> {
    validate_event_name(event)?;
    if is_builtin_event(event) {
        return Err(DispatchError::ReservedEventName(event.to_string()));
    }
    Ok(())
}

impl Dispatcher {
    // -----------------------------------------------------------------------
    // Subscribe
    // -----------------------------------------------------------------------

    pub fn on_text_message<F>(&self, handler: F, channel: Option<&Channel>) -> Listener
    where
        F: Fn(&TextMessage) -> Result<()> + Send + Sync + 'static,
    {
        self.register(EventKey::new(TEXT, channel), Callback::text(handler))
    }

    pub fn on_protocol_message<F>(&self, handler: F, channel: Option<&Channel>) -> Listener
    where
        F: Fn(&ProtocolMessage) -> Result<()> + Send + Sync + 'static,
    {
        self.register(EventKey::new(PROTOCOL, channel), Callback::protocol(handler))
    }

    pub fn on_join<F>(&self, handler: F, channel: Option<&Channel>) -> Listener
    where
        F: Fn(&Channel) -> Result<()> + Send + Sync + 'static,
    {
        self.register(EventKey::new(JOIN, channel), Callback::membership(handler))
    }

    pub fn on_part<F>(&self, handler: F, channel: Option<&Channel>) -> Listener
    where
        F: Fn(&Channel) -> Result<()> + Send + Sync + 'static,
    {
        self.register(EventKey::new(PART, channel), Callback::membership(handler))
    }

    /// Subscribe to a plugin-defined event carrying a JSON payload.
    pub fn on_event<F>(
        &self,
        event: &str,
        handler: F,
        channel: Option<&Channel>,
    ) -> Result<Listener, DispatchError>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        check_custom_event(event)?;
        Ok(self.register(EventKey::new(event, channel), Callback::custom(handler)))
    }

    // -----------------------------------------------------------------------
    // Publish
    // -----------------------------------------------------------------------

    /// Deliver a chat line to `TEXT` listeners, global and for its channel.
    ///
    /// Pass an `Arc` to inspect the processed flag afterwards.
    pub fn handle_text_message(
        &self,
        msg: impl Into<Arc<TextMessage>>,
    ) -> Result<(), DispatchError> {
        let msg: Arc<TextMessage> = msg.into();
        let channel = msg.channel().clone();
        {
            let text = if self.shared().redact_chat {
                Cow::Owned(redact_sensitive_data(msg.text()))
            } else {
                Cow::Borrowed(msg.text())
            };
            trace!(
                channel = %channel,
                user = msg.user(),
                %text,
                "[Dispatch] Text message"
            );
        }
        self.shared().trigger(
            TEXT,
            Some(&channel),
            Box::new(move |callback: &Callback| match callback {
                Callback::Text(handler) => handler(msg.as_ref()).map_err(DeliveryError::from),
                other => Err(mismatch(HandlerShape::Text, other)),
            }),
        )
    }

    /// Deliver a protocol notice; channel-less notices reach only global listeners.
    pub fn handle_protocol_message(&self, msg: ProtocolMessage) -> Result<(), DispatchError> {
        trace!(command = msg.command(), "[Dispatch] Protocol message");
        let channel = msg.channel().cloned();
        self.shared().trigger(
            PROTOCOL,
            channel.as_ref(),
            Box::new(move |callback: &Callback| match callback {
                Callback::Protocol(handler) => handler(&msg).map_err(DeliveryError::from),
                other => Err(mismatch(HandlerShape::Protocol, other)),
            }),
        )
    }

    pub fn handle_join(&self, channel: &Channel) -> Result<(), DispatchError> {
        debug!(channel = %channel, "[Dispatch] Join");
        self.publish_membership(JOIN, channel)
    }

    pub fn handle_part(&self, channel: &Channel) -> Result<(), DispatchError> {
        debug!(channel = %channel, "[Dispatch] Part");
        self.publish_membership(PART, channel)
    }

    fn publish_membership(&self, event: &str, channel: &Channel) -> Result<(), DispatchError> {
        let payload = channel.clone();
        self.shared().trigger(
            event,
            Some(channel),
            Box::new(move |callback: &Callback| match callback {
                Callback::Membership(handler) => handler(&payload).map_err(DeliveryError::from),
                other => Err(mismatch(HandlerShape::Membership, other)),
            }),
        )
    }

    /// Publish a plugin-defined event to its `on_event` listeners.
    pub fn emit(
        &self,
        event: &str,
        channel: Option<&Channel>,
        payload: Value,
    ) -> Result<(), DispatchError> {
        check_custom_event(event)?;
        self.shared().trigger(
            event,
            channel,
            Box::new(move |callback: &Callback| match callback {
                Callback::Custom(handler) => handler(&payload).map_err(DeliveryError::from),
                other => Err(mismatch(HandlerShape::Custom, other)),
            }),
        )
    }
}
