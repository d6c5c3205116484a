//! Satori signalling frames.
//!
//! Every WebSocket frame is `{"op": <u8>, "body": <object?>}`.

use parley_core::error::ChannelError;
use parley_core::event::{Event, Login};
use serde::Deserialize;
use serde_json::json;

pub const OP_EVENT: u8 = 0;
pub const OP_PING: u8 = 1;
pub const OP_PONG: u8 = 2;
pub const OP_IDENTIFY: u8 = 3;
pub const OP_READY: u8 = 4;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Event(Box<Event>),
    Ready(Vec<Login>),
    Pong,
    /// Opcodes a client never expects to receive
    Other(u8),
}

#[derive(Deserialize)]
struct RawSignal {
    op: u8,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ReadyBody {
    #[serde(default)]
    logins: Vec<Login>,
}

pub fn decode_signal(text: &str) -> Result<Signal, ChannelError> {
    let raw: RawSignal = serde_json::from_str(text)
        .map_err(|e| ChannelError::InvalidPayload(format!("frame: {e}")))?;

    match raw.op {
        OP_EVENT => {
            let body = raw
                .body
                .ok_or_else(|| ChannelError::InvalidPayload("EVENT without body".into()))?;
            let event: Event = serde_json::from_value(body)
                .map_err(|e| ChannelError::InvalidPayload(format!("event body: {e}")))?;
            Ok(Signal::Event(Box::new(event)))
        }
        OP_READY => {
            let body: ReadyBody = match raw.body {
                Some(body) => serde_json::from_value(body)
                    .map_err(|e| ChannelError::InvalidPayload(format!("ready body: {e}")))?,
                None => ReadyBody { logins: vec![] },
            };
            Ok(Signal::Ready(body.logins))
        }
        OP_PONG => Ok(Signal::Pong),
        other => Ok(Signal::Other(other)),
    }
}

/// IDENTIFY frame. `sequence` resumes after the last seen event.
pub fn identify_frame(token: Option<&str>, sequence: Option<u64>) -> String {
    let mut body = serde_json::Map::new();
    if let Some(token) = token {
        body.insert("token".into(), json!(token));
    }
    if let Some(sequence) = sequence {
        // Older servers read `sequence`, newer ones `sn`
        body.insert("sequence".into(), json!(sequence));
        body.insert("sn".into(), json!(sequence));
    }
    json!({"op": OP_IDENTIFY, "body": body}).to_string()
}

pub fn ping_frame() -> String {
    json!({"op": OP_PING, "body": {}}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_event_frame() {
        let frame = r#"{"op":0,"body":{"id":12,"type":"message-created","platform":"qq",
            "self_id":"bot","channel":{"id":"c1"},"user":{"id":"u1"},
            "message":{"id":"m1","content":"hi"}}}"#;
        match decode_signal(frame).unwrap() {
            Signal::Event(event) => {
                assert_eq!(event.id, 12);
                assert_eq!(event.dedup_key().as_deref(), Some("c1-m1"));
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn decodes_ready_logins() {
        let frame = r#"{"op":4,"body":{"logins":[{"platform":"discord","self_id":"42"}]}}"#;
        let Signal::Ready(logins) = decode_signal(frame).unwrap() else {
            panic!("expected ready");
        };
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].self_id.as_deref(), Some("42"));
    }

    #[test]
    fn pong_and_unknown_opcodes() {
        assert_eq!(decode_signal(r#"{"op":2}"#).unwrap(), Signal::Pong);
        assert_eq!(decode_signal(r#"{"op":9,"body":{}}"#).unwrap(), Signal::Other(9));
    }

    #[test]
    fn malformed_frame_is_invalid_payload() {
        assert!(matches!(
            decode_signal("not json"),
            Err(ChannelError::InvalidPayload(_))
        ));
        assert!(decode_signal(r#"{"op":0}"#).is_err());
    }

    #[test]
    fn identify_carries_token_and_sequence() {
        let frame: serde_json::Value =
            serde_json::from_str(&identify_frame(Some("secret"), Some(7))).unwrap();
        assert_eq!(frame["op"], 3);
        assert_eq!(frame["body"]["token"], "secret");
        assert_eq!(frame["body"]["sequence"], 7);

        let bare: serde_json::Value = serde_json::from_str(&identify_frame(None, None)).unwrap();
        assert!(bare["body"].as_object().unwrap().is_empty());
    }

    #[test]
    fn ping_frame_opcode() {
        let frame: serde_json::Value = serde_json::from_str(&ping_frame()).unwrap();
        assert_eq!(frame["op"], 1);
    }
}
