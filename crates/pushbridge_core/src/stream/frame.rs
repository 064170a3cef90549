//! Frames of the realtime event stream (JSON over WebSocket text frames).

use serde::Deserialize;
use serde_json::Value;

use crate::push::RawPush;

/// A frame received on the event stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Something changed on the account; fetch it.
    Tickle {
        /// What changed (`push`, `device`, ...).
        #[serde(default)]
        subtype: Option<String>,
    },
    /// An ephemeral push delivered inline.
    Push {
        /// The push object.
        #[serde(default)]
        push: Value,
    },
    /// Keepalive, sent every 30 seconds.
    Nop,
    /// Catch-all for other frame types.
    #[serde(other)]
    Other,
}

impl StreamFrame {
    /// Parse a text frame. Unparseable input is reported as [`StreamFrame::Other`].
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or(StreamFrame::Other)
    }

    /// Whether this is a tickle for the push list.
    pub fn is_push_tickle(&self) -> bool {
        matches!(self, StreamFrame::Tickle { subtype: Some(s) } if s == "push")
    }

    /// Inline push record, for `push` frames.
    pub fn inline_push(&self) -> Option<RawPush> {
        match self {
            StreamFrame::Push { push } => Some(RawPush::from_value(push.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_tickle() {
        let frame = StreamFrame::parse(r#"{"type": "tickle", "subtype": "push"}"#);
        assert!(frame.is_push_tickle());
    }

    #[test]
    fn test_device_tickle() {
        let frame = StreamFrame::parse(r#"{"type": "tickle", "subtype": "device"}"#);
        assert_eq!(
            frame,
            StreamFrame::Tickle {
                subtype: Some("device".to_string())
            }
        );
        assert!(!frame.is_push_tickle());
    }

    #[test]
    fn test_tickle_without_subtype() {
        let frame = StreamFrame::parse(r#"{"type": "tickle"}"#);
        assert_eq!(frame, StreamFrame::Tickle { subtype: None });
        assert!(!frame.is_push_tickle());
    }

    #[test]
    fn test_inline_push() {
        let frame = StreamFrame::parse(
            r#"{"type": "push", "push": {"type": "mirror", "title": "SMS", "body": "hi"}}"#,
        );
        let push = frame.inline_push().unwrap();
        assert_eq!(push.push_type(), Some("mirror"));
        assert_eq!(push.field_text("body").as_deref(), Some("hi"));
    }

    #[test]
    fn test_nop() {
        assert_eq!(StreamFrame::parse(r#"{"type": "nop"}"#), StreamFrame::Nop);
    }

    #[test]
    fn test_unknown_and_invalid() {
        assert_eq!(
            StreamFrame::parse(r#"{"type": "ephemeral_v2", "data": 1}"#),
            StreamFrame::Other
        );
        assert_eq!(StreamFrame::parse("not json"), StreamFrame::Other);
        assert!(StreamFrame::Nop.inline_push().is_none());
    }
}
