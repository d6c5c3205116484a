//! Satori event model.
//!
//! Only the fields the control loop reads are modelled; everything else in
//! the payload is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// A platform event delivered by the event source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number assigned by the Satori server
    #[serde(default, alias = "sn")]
    pub id: u64,

    /// Event type, e.g. `message-created`
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub platform: String,

    /// The bot's own account id on `platform`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<EventChannel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EventUser>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<EventMember>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<EventMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<Login>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventChannel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bot: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EventUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EventUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<EventMember>,
}

/// A connected bot account, as listed by READY and attached to events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Login {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EventUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,
}

impl Event {
    pub fn channel_id(&self) -> Option<&str> {
        self.channel.as_ref().map(|c| c.id.as_str())
    }

    pub fn channel_name(&self) -> Option<&str> {
        self.channel.as_ref().and_then(|c| c.name.as_deref())
    }

    /// Stable identity used for at-most-once ingestion: `{channel}-{message}`.
    ///
    /// `None` for events that carry no message or no channel.
    pub fn dedup_key(&self) -> Option<String> {
        let channel = self.channel_id()?;
        let message = self.message.as_ref()?;
        Some(format!("{channel}-{}", message.id))
    }

    /// The bot's own account id, from the event or its login.
    pub fn resolved_self_id(&self) -> Option<&str> {
        self.self_id
            .as_deref()
            .or_else(|| self.login.as_ref().and_then(|l| l.self_id.as_deref()))
    }

    /// The author id, wherever the platform adapter put it.
    pub fn author_id(&self) -> Option<&str> {
        let message = self.message.as_ref();
        user_id(self.user.as_ref())
            .or_else(|| member_user_id(self.member.as_ref()))
            .or_else(|| user_id(message.and_then(|m| m.user.as_ref())))
            .or_else(|| member_user_id(message.and_then(|m| m.member.as_ref())))
    }

    /// Display name for the author, falling back to the author id.
    pub fn author_name(&self) -> Option<&str> {
        let user = self
            .user
            .as_ref()
            .or_else(|| self.message.as_ref().and_then(|m| m.user.as_ref()));
        self.member
            .as_ref()
            .and_then(|m| m.nick.as_deref())
            .or_else(|| user.and_then(|u| u.nick.as_deref()))
            .or_else(|| user.and_then(|u| u.name.as_deref()))
            .filter(|name| !name.is_empty())
            .or_else(|| self.author_id())
    }

    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .filter(|c| !c.is_empty())
    }
}

/// Non-empty id of a user, if any.
fn user_id(user: Option<&EventUser>) -> Option<&str> {
    user.map(|u| u.id.as_str()).filter(|id| !id.is_empty())
}

fn member_user_id(member: Option<&EventMember>) -> Option<&str> {
    user_id(member.and_then(|m| m.user.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Event {
        serde_json::from_value(serde_json::json!({
            "sn": 7,
            "type": "message-created",
            "platform": "discord",
            "self_id": "bot",
            "channel": {"id": "c1", "name": "general"},
            "user": {"id": "u1", "name": "alice"},
            "message": {"id": "m1", "content": "hello"}
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_satori_payload() {
        let event = sample();
        assert_eq!(event.id, 7);
        assert_eq!(event.kind, "message-created");
        assert_eq!(event.channel_id(), Some("c1"));
        assert_eq!(event.channel_name(), Some("general"));
        assert_eq!(event.content(), Some("hello"));
    }

    #[test]
    fn dedup_key_combines_channel_and_message() {
        assert_eq!(sample().dedup_key().as_deref(), Some("c1-m1"));

        let mut no_message = sample();
        no_message.message = None;
        assert!(no_message.dedup_key().is_none());
    }

    #[test]
    fn self_id_falls_back_to_login() {
        let mut event = sample();
        event.self_id = None;
        event.login = Some(Login {
            self_id: Some("bot-login".into()),
            ..Login::default()
        });
        assert_eq!(event.resolved_self_id(), Some("bot-login"));
    }

    #[test]
    fn author_resolves_through_member_and_message() {
        let mut event = sample();
        event.user = None;
        event.message = Some(EventMessage {
            id: "m1".into(),
            content: "x".into(),
            user: None,
            member: Some(EventMember {
                user: Some(EventUser {
                    id: "u9".into(),
                    ..EventUser::default()
                }),
                nick: None,
            }),
        });
        assert_eq!(event.author_id(), Some("u9"));
        assert_eq!(event.author_name(), Some("u9"));
    }

    #[test]
    fn empty_user_id_falls_through_to_member() {
        let mut event = sample();
        event.user = Some(EventUser {
            id: String::new(),
            ..EventUser::default()
        });
        event.member = Some(EventMember {
            user: Some(EventUser {
                id: "u2".into(),
                ..EventUser::default()
            }),
            nick: None,
        });
        assert_eq!(event.author_id(), Some("u2"));

        event.member = None;
        assert_eq!(event.author_id(), None);
    }

    #[test]
    fn author_name_prefers_member_nick() {
        let mut event = sample();
        event.member = Some(EventMember {
            user: None,
            nick: Some("Al".into()),
        });
        assert_eq!(event.author_name(), Some("Al"));
        assert_eq!(event.author_id(), Some("u1"));
    }
}
