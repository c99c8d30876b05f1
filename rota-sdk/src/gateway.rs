//! The notification gateway contract.
//!
//! Everything the rotation needs from the chat platform goes through
//! [`Gateway`]. The Slack implementation lives in [`crate::slack`]; tests
//! substitute an in-memory fake.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Opaque platform user identifier (e.g. `U024BE7LH`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to a posted message. On Slack this is the message `ts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageRef(pub String);

impl MessageRef {
    pub fn new(ts: impl Into<String>) -> Self {
        Self(ts.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deserialize an optional reference, treating `null`, `""` and `0` as absent.
    ///
    /// Older state files wrote a numeric `0` before any announcement existed.
    pub fn deserialize_optional<'de, D>(
        deserializer: D,
    ) -> std::result::Result<Option<Self>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawRef>::deserialize(deserializer)?;
        Ok(raw.and_then(RawRef::into_ref))
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageRef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawRef::deserialize(deserializer)? {
            RawRef::Text(s) => Ok(MessageRef(s)),
            RawRef::Number(n) => Ok(MessageRef(n.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRef {
    Text(String),
    Number(serde_json::Number),
}

impl RawRef {
    fn into_ref(self) -> Option<MessageRef> {
        match self {
            RawRef::Text(s) if s.is_empty() || s == "0" => None,
            RawRef::Text(s) => Some(MessageRef(s)),
            RawRef::Number(n) if n.as_f64() == Some(0.0) => None,
            RawRef::Number(n) => Some(MessageRef(n.to_string())),
        }
    }
}

/// Profile fields the rotation cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub is_bot: bool,
    /// Deactivated account.
    pub deleted: bool,
}

/// One emoji on a message and everyone who placed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    pub users: Vec<UserId>,
}

/// Chat platform operations consumed by the rotation.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Ids of everyone in the channel, in platform order.
    async fn list_channel_members(&self, channel: &str) -> Result<Vec<UserId>>;

    async fn user_profile(&self, user: &UserId) -> Result<UserProfile>;

    /// Post `text` to `channel` and return a reference to the new message.
    async fn post_message(&self, channel: &str, text: &str) -> Result<MessageRef>;

    /// All reactions on a message. A message nobody reacted to yields an empty list.
    async fn reactions(&self, channel: &str, message: &MessageRef) -> Result<Vec<Reaction>>;

    /// The bot's own user id.
    async fn self_id(&self) -> Result<UserId>;
}
