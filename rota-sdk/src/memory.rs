//! In-memory [`Gateway`] for tests.
//!
//! Holds channel listings, profiles and reactions in maps, records every
//! posted message, and can be told to fail individual operations.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::gateway::{Gateway, MessageRef, Reaction, UserId, UserProfile};

/// A message recorded by [`MemoryGateway::post_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub channel: String,
    pub text: String,
    pub message: MessageRef,
}

#[derive(Default)]
struct Inner {
    channels: HashMap<String, Vec<UserId>>,
    profiles: HashMap<UserId, UserProfile>,
    reactions: HashMap<MessageRef, Vec<Reaction>>,
    posted: Vec<Posted>,
    broken_profiles: HashSet<UserId>,
    fail_listing: bool,
    fail_posting: bool,
    fail_reactions: bool,
    post_delay: Option<Duration>,
    next_ts: u64,
}

pub struct MemoryGateway {
    self_id: UserId,
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: UserId::new(self_id),
            inner: Mutex::new(Inner {
                next_ts: 1,
                ..Inner::default()
            }),
        }
    }

    /// Add a human member to `channel`.
    pub fn add_member(&self, channel: &str, id: &str, display_name: &str) {
        self.add_profile(
            channel,
            UserProfile {
                id: UserId::new(id),
                display_name: display_name.to_string(),
                is_bot: false,
                deleted: false,
            },
        );
    }

    /// Add any profile (bots, deactivated accounts) to `channel`.
    pub fn add_profile(&self, channel: &str, profile: UserProfile) {
        let mut inner = self.inner.lock();
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(profile.id.clone());
        inner.profiles.insert(profile.id.clone(), profile);
    }

    /// Record that `users` reacted with `emoji` to `message`.
    pub fn react(&self, message: &MessageRef, emoji: &str, users: &[&str]) {
        self.inner
            .lock()
            .reactions
            .entry(message.clone())
            .or_default()
            .push(Reaction {
                emoji: emoji.to_string(),
                users: users.iter().map(|u| UserId::new(*u)).collect(),
            });
    }

    pub fn break_profile(&self, id: &str) {
        self.inner.lock().broken_profiles.insert(UserId::new(id));
    }

    pub fn fail_listing(&self, fail: bool) {
        self.inner.lock().fail_listing = fail;
    }

    pub fn fail_posting(&self, fail: bool) {
        self.inner.lock().fail_posting = fail;
    }

    pub fn fail_reactions(&self, fail: bool) {
        self.inner.lock().fail_reactions = fail;
    }

    /// Make every post wait before completing.
    pub fn delay_posts(&self, delay: Duration) {
        self.inner.lock().post_delay = Some(delay);
    }

    pub fn posted(&self) -> Vec<Posted> {
        self.inner.lock().posted.clone()
    }

    pub fn last_posted(&self) -> Option<Posted> {
        self.inner.lock().posted.last().cloned()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn list_channel_members(&self, channel: &str) -> Result<Vec<UserId>> {
        let inner = self.inner.lock();
        if inner.fail_listing {
            return Err(Error::Status {
                method: "conversations.members",
                status: 503,
            });
        }
        Ok(inner.channels.get(channel).cloned().unwrap_or_default())
    }

    async fn user_profile(&self, user: &UserId) -> Result<UserProfile> {
        let inner = self.inner.lock();
        if inner.broken_profiles.contains(user) {
            return Err(Error::Status {
                method: "users.info",
                status: 500,
            });
        }
        inner.profiles.get(user).cloned().ok_or_else(|| Error::Api {
            method: "users.info",
            code: "user_not_found".to_string(),
        })
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<MessageRef> {
        let delay = self.inner.lock().post_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock();
        if inner.fail_posting {
            return Err(Error::Api {
                method: "chat.postMessage",
                code: "not_in_channel".to_string(),
            });
        }
        let message = MessageRef::new(format!("{}.000100", 1_700_000_000 + inner.next_ts));
        inner.next_ts += 1;
        inner.posted.push(Posted {
            channel: channel.to_string(),
            text: text.to_string(),
            message: message.clone(),
        });
        Ok(message)
    }

    async fn reactions(&self, _channel: &str, message: &MessageRef) -> Result<Vec<Reaction>> {
        let inner = self.inner.lock();
        if inner.fail_reactions {
            return Err(Error::Api {
                method: "reactions.get",
                code: "message_not_found".to_string(),
            });
        }
        Ok(inner.reactions.get(message).cloned().unwrap_or_default())
    }

    async fn self_id(&self) -> Result<UserId> {
        Ok(self.self_id.clone())
    }
}
