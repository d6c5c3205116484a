//! Conversation turn types.
//!
//! A channel's history is a list of [`Message`]s that is replayed to the
//! planner on every cycle, between the system preamble and the decision turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Incoming text, decision prompts, and bookkeeping notices
    User,
    /// Text the bot actually sent
    Assistant,
    /// Persona and action catalogue
    System,
}

/// A single turn in a channel's conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// A bookkeeping notice injected into the history.
    ///
    /// Notices travel as user turns prefixed with `System:` so that every
    /// OpenAI-compatible backend accepts them mid-conversation.
    pub fn notice(content: impl AsRef<str>) -> Self {
        Self::new(Role::User, format!("System: {}", content.as_ref()))
    }

    pub fn is_notice(&self) -> bool {
        self.role == Role::User && self.content.starts_with("System: ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_role() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hello").role, Role::Assistant);
        assert_eq!(Message::system("rules").role, Role::System);
    }

    #[test]
    fn notice_is_prefixed_user_turn() {
        let notice = Message::notice("history trimmed");
        assert_eq!(notice.role, Role::User);
        assert_eq!(notice.content, "System: history trimmed");
        assert!(notice.is_notice());
        assert!(!Message::user("hello").is_notice());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
