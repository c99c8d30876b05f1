//! Slack Web API client.
//!
//! Implements [`Gateway`] over `conversations.members`, `users.info`,
//! `chat.postMessage`, `reactions.get` and `auth.test`. Every call goes
//! through one request path with a per-request timeout and a bounded
//! retry loop for transient failures (5xx, 429, `ratelimited`, transport).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::gateway::{Gateway, MessageRef, Reaction, UserId, UserProfile};

/// Default Web API root.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Page size for cursor-paginated methods.
const PAGE_LIMIT: u32 = 200;

/// How many times to try a call and how long to wait between tries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Clamped to at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including server-requested ones.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32, err: &Error) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        err.retry_after().unwrap_or(backoff).min(self.max_delay)
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`).
    pub bot_token: String,
    /// API root, without trailing slash.
    pub api_base: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Slack Web API client.
pub struct SlackClient {
    config: SlackConfig,
    http: reqwest::Client,
    self_id: OnceCell<UserId>,
}

enum Call<'a> {
    Get(&'a [(&'a str, String)]),
    Post(&'a serde_json::Value),
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http,
            self_id: OnceCell::new(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &'static str, call: Call<'_>) -> Result<T> {
        let attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.call_once(method, &call).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.config.retry.delay_for(attempt, &e);
                    tracing::warn!(method, attempt, error = %e, ?delay, "Slack call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &'static str,
        call: &Call<'_>,
    ) -> Result<T> {
        let url = format!("{}/{method}", self.config.api_base);
        let request = match call {
            Call::Get(query) => self.http.get(&url).query(query),
            Call::Post(body) => self.http.post(&url).json(body),
        };
        let resp = request.bearer_auth(&self.config.bot_token).send().await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(Error::RateLimited { method, retry_after });
        }
        if !status.is_success() {
            return Err(Error::Status {
                method,
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await?;
        let envelope: Envelope =
            serde_json::from_slice(&body).map_err(|source| Error::Decode { method, source })?;
        if !envelope.ok {
            let code = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            if code == "ratelimited" {
                return Err(Error::RateLimited {
                    method,
                    retry_after: None,
                });
            }
            return Err(Error::Api { method, code });
        }
        serde_json::from_slice(&body).map_err(|source| Error::Decode { method, source })
    }
}

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct MembersPage {
    #[serde(default)]
    members: Vec<UserId>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct UserInfo {
    user: ApiUser,
}

#[derive(Deserialize)]
struct ApiUser {
    id: UserId,
    #[serde(default)]
    name: String,
    real_name: Option<String>,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    deleted: bool,
    profile: Option<ApiProfile>,
}

#[derive(Deserialize)]
struct ApiProfile {
    real_name: Option<String>,
}

impl ApiUser {
    fn into_profile(self) -> UserProfile {
        let display_name = self
            .real_name
            .filter(|n| !n.is_empty())
            .or_else(|| self.profile.and_then(|p| p.real_name).filter(|n| !n.is_empty()))
            .unwrap_or(self.name);
        UserProfile {
            id: self.id,
            display_name,
            is_bot: self.is_bot,
            deleted: self.deleted,
        }
    }
}

#[derive(Deserialize)]
struct PostedMessage {
    ts: MessageRef,
}

#[derive(Deserialize)]
struct ReactionsResponse {
    message: Option<ReactedMessage>,
}

#[derive(Deserialize)]
struct ReactedMessage {
    #[serde(default)]
    reactions: Vec<ApiReaction>,
}

#[derive(Deserialize)]
struct ApiReaction {
    name: String,
    #[serde(default)]
    users: Vec<UserId>,
}

#[derive(Deserialize)]
struct AuthTest {
    user_id: UserId,
}

#[async_trait]
impl Gateway for SlackClient {
    async fn list_channel_members(&self, channel: &str) -> Result<Vec<UserId>> {
        let mut members = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut query = vec![
                ("channel", channel.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }
            let page: MembersPage = self.call("conversations.members", Call::Get(&query)).await?;
            members.extend(page.members);
            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }
        tracing::debug!(channel, count = members.len(), "Listed channel members");
        Ok(members)
    }

    async fn user_profile(&self, user: &UserId) -> Result<UserProfile> {
        let query = [("user", user.to_string())];
        let info: UserInfo = self.call("users.info", Call::Get(&query)).await?;
        Ok(info.user.into_profile())
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<MessageRef> {
        let body = serde_json::json!({
            "channel": channel,
            "text": text,
        });
        let posted: PostedMessage = self.call("chat.postMessage", Call::Post(&body)).await?;
        Ok(posted.ts)
    }

    async fn reactions(&self, channel: &str, message: &MessageRef) -> Result<Vec<Reaction>> {
        let query = [
            ("channel", channel.to_string()),
            ("timestamp", message.to_string()),
            ("full", "true".to_string()),
        ];
        let resp: ReactionsResponse = self.call("reactions.get", Call::Get(&query)).await?;
        Ok(resp
            .message
            .map(|m| m.reactions)
            .unwrap_or_default()
            .into_iter()
            .map(|r| Reaction {
                emoji: r.name,
                users: r.users,
            })
            .collect())
    }

    async fn self_id(&self) -> Result<UserId> {
        let id = self
            .self_id
            .get_or_try_init(|| async {
                let auth: AuthTest = self
                    .call("auth.test", Call::Post(&serde_json::json!({})))
                    .await?;
                Ok::<_, Error>(auth.user_id)
            })
            .await?;
        Ok(id.clone())
    }
}
