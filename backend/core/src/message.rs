use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// Prefix that marks a chat line as a bot command.
const COMMAND_PREFIX: char = '!';

/// A chat line posted to a channel.
///
/// The processed flag is shared by every listener of one delivery: a plugin
/// that consumes the line marks it so later plugins can skip it.
#[derive(Debug)]
pub struct TextMessage {
    channel: Channel,
    user: String,
    text: String,
    from_bot: bool,
    processed: AtomicBool,
    received_at: DateTime<Utc>,
}

impl TextMessage {
    pub fn new(channel: Channel, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel,
            user: user.into(),
            text: text.into(),
            from_bot: false,
            processed: AtomicBool::new(false),
            received_at: Utc::now(),
        }
    }

    /// Mark this line as one the bot itself sent.
    pub fn from_bot(mut self) -> Self {
        self.from_bot = true;
        self
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn is_from(&self, user: &str) -> bool {
        self.user.eq_ignore_ascii_case(user)
    }

    pub fn is_from_bot(&self) -> bool {
        self.from_bot
    }

    pub fn is_processed(&self) -> bool {
        self.processed.load(Ordering::Acquire)
    }

    pub fn set_processed(&self) {
        self.processed.store(true, Ordering::Release);
    }

    /// The command name of a `!command arg ...` line, lowercased.
    pub fn command(&self) -> Option<String> {
        let first = self.text.split_whitespace().next()?;
        let name = first.strip_prefix(COMMAND_PREFIX)?;
        if name.is_empty() {
            return None;
        }
        Some(name.to_lowercase())
    }

    /// Words following the command; empty when the line is not a command.
    pub fn arguments(&self) -> Vec<&str> {
        if self.command().is_none() {
            return Vec::new();
        }
        self.text.split_whitespace().skip(1).collect()
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.command()
            .is_some_and(|command| command.eq_ignore_ascii_case(name))
    }
}

/// A protocol-level notice (`CLEARCHAT`, `USERSTATE`, ...) rather than chat text.
///
/// Server-wide notices carry no channel and only reach global listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    channel: Option<Channel>,
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

impl ProtocolMessage {
    pub fn new(channel: Option<Channel>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            channel,
            command: command.into().to_uppercase(),
            args,
        }
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}
