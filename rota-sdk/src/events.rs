//! Slack Events API payloads delivered to the bot's HTTP endpoint.

use serde::Deserialize;

use crate::gateway::UserId;

/// Outer envelope of an Events API request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Sent once when the request URL is configured; echo the challenge back.
    UrlVerification { challenge: String },
    /// A subscribed workspace event.
    EventCallback { event: Event },
    /// Anything else (e.g. `app_rate_limited`).
    #[serde(other)]
    Unknown,
}

/// Inner event of an `event_callback`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Message {
        channel: String,
        #[serde(default)]
        user: Option<UserId>,
        #[serde(default)]
        text: String,
        /// Set when a bot posted the message.
        #[serde(default)]
        bot_id: Option<String>,
        #[serde(default)]
        subtype: Option<String>,
    },
    MemberJoinedChannel {
        channel: String,
        user: UserId,
    },
    #[serde(other)]
    Other,
}

impl Event {
    /// Whether this is a plain human message whose text, trimmed and
    /// lowercased, equals `command`.
    pub fn is_command(&self, command: &str) -> bool {
        match self {
            Event::Message {
                text,
                bot_id,
                subtype,
                ..
            } => bot_id.is_none() && subtype.is_none() && text.trim().to_lowercase() == command,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_verification() {
        let env: Envelope = serde_json::from_str(
            r#"{"token":"x","challenge":"3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P","type":"url_verification"}"#,
        )
        .unwrap();
        match env {
            Envelope::UrlVerification { challenge } => assert!(challenge.starts_with("3eZb")),
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn parses_member_joined() {
        let env: Envelope = serde_json::from_str(
            r#"{"type":"event_callback","team_id":"T1","event":{"type":"member_joined_channel","user":"U9","channel":"C1","channel_type":"C"}}"#,
        )
        .unwrap();
        match env {
            Envelope::EventCallback {
                event: Event::MemberJoinedChannel { channel, user },
            } => {
                assert_eq!(channel, "C1");
                assert_eq!(user, UserId::new("U9"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn list_command_matches_trimmed_case_folded_text() {
        let env: Envelope = serde_json::from_str(
            r#"{"type":"event_callback","event":{"type":"message","channel":"C1","user":"U1","text":"  List \n"}}"#,
        )
        .unwrap();
        let Envelope::EventCallback { event } = env else {
            panic!("expected event callback");
        };
        assert!(event.is_command("list"));
        assert!(!event.is_command("help"));
    }

    #[test]
    fn bot_messages_are_not_commands() {
        let event: Event = serde_json::from_str(
            r#"{"type":"message","channel":"C1","bot_id":"B1","text":"list"}"#,
        )
        .unwrap();
        assert!(!event.is_command("list"));
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let env: Envelope =
            serde_json::from_str(r#"{"type":"app_rate_limited","minute_rate_limited":1}"#)
                .unwrap();
        assert!(matches!(env, Envelope::Unknown));
        let event: Event =
            serde_json::from_str(r#"{"type":"reaction_added","user":"U1"}"#).unwrap();
        assert!(matches!(event, Event::Other));
    }
}
