//! The closed action vocabulary and the outcome of executing one.
//!
//! The planner produces a JSON object `{"action": "<name>", ...fields}`.
//! The dispatcher resolves `<name>` in the registry, then decodes the object
//! into an [`Action`] for the handler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded planner decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Go idle until the next trigger.
    Continue,

    /// Forget this channel's messages and action history.
    Break,

    /// Pause, then keep acting.
    Sleep {
        /// Milliseconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seconds: Option<f64>,
    },

    ListChannels,

    SendMessage {
        #[serde(alias = "channelId")]
        channel_id: String,
        content: String,
    },

    ReadUnreadMessages {
        #[serde(default, alias = "channelId", skip_serializing_if = "Option::is_none")]
        channel_id: Option<String>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Continue => "continue",
            Action::Break => "break",
            Action::Sleep { .. } => "sleep",
            Action::ListChannels => "list_channels",
            Action::SendMessage { .. } => "send_message",
            Action::ReadUnreadMessages { .. } => "read_unread_messages",
        }
    }

    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        Action::deserialize(payload)
    }
}

/// What happened when an action ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    /// Run another cycle right away (after the continue delay).
    pub should_continue: bool,
    pub result: String,
}

impl ActionResult {
    pub fn ok(result: impl Into<String>, should_continue: bool) -> Self {
        Self {
            success: true,
            should_continue,
            result: result.into(),
        }
    }

    /// A failure the planner should see and react to on the next cycle.
    pub fn recoverable(result: impl Into<String>) -> Self {
        Self {
            success: false,
            should_continue: true,
            result: result.into(),
        }
    }
}

/// One entry of a channel's action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The payload exactly as the planner produced it (after flattening)
    pub action: Value,
    pub result: ActionResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_fields() {
        let action = Action::from_payload(&json!({
            "action": "send_message",
            "channelId": "c1",
            "content": "hi"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::SendMessage {
                channel_id: "c1".into(),
                content: "hi".into()
            }
        );
        assert_eq!(action.name(), "send_message");
    }

    #[test]
    fn decodes_snake_case_fields() {
        let action = Action::from_payload(&json!({
            "action": "read_unread_messages",
            "channel_id": "c9"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::ReadUnreadMessages {
                channel_id: Some("c9".into())
            }
        );
    }

    #[test]
    fn unit_actions_ignore_extra_fields() {
        let action =
            Action::from_payload(&json!({"action": "continue", "reason": "idle"})).unwrap();
        assert_eq!(action, Action::Continue);
    }

    #[test]
    fn send_without_content_fails_to_decode() {
        assert!(
            Action::from_payload(&json!({"action": "send_message", "channelId": "c1"})).is_err()
        );
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(ActionResult::recoverable("boom")).unwrap();
        assert_eq!(json, json!({"success": false, "shouldContinue": true, "result": "boom"}));
    }
}
