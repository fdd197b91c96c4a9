use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A chat channel the bot is joined to.
///
/// Names are normalized on construction (one leading `#` stripped, lowercased)
/// so they can be appended to an event name as a single `#channel` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel {
    name: String,
}

impl Channel {
    pub fn new(name: impl AsRef<str>) -> Result<Self, CoreError> {
        let raw = name.as_ref();
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix('#').unwrap_or(trimmed);

        if bare.is_empty() || bare.contains('#') || bare.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidChannelName(raw.to_string()));
        }

        Ok(Self {
            name: bare.to_lowercase(),
        })
    }

    /// The normalized name, without the leading `#`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name)
    }
}

impl TryFrom<String> for Channel {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.name
    }
}
