//! Push normalization.
//!
//! Maps a [`RawPush`] to a [`Canonical`] notification and a [`Disposition`]
//! telling the caller what to do with it. Pure and I/O free.
//!
//! Per-type extraction is driven by [`HANDLERS`], a table from push type to a
//! [`Handler`] describing where topic, payload and message come from. Types
//! missing from the table fall through to [`Disposition::Ignored`].

use serde::Serialize;

use crate::push::RawPush;

/// Topic used for dismissed pushes.
pub const TOPIC_DISMISSED: &str = "Push dismissed";
/// Topic used for deleted pushes.
pub const TOPIC_DELETED: &str = "Push deleted";
/// Topic used for clipboard pushes.
pub const TOPIC_CLIPBOARD: &str = "Clipboard content";

/// What the caller should do with a normalized push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Write to the state sink (and possibly delete remotely).
    Publish,
    /// The push was dismissed; nothing is written.
    SuppressedDismissal,
    /// The push was deleted; nothing is written.
    SuppressedDelete,
    /// Unknown type or addressed to another device; nothing happens.
    Ignored,
}

/// Canonical notification written to the state sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Canonical {
    /// Effective push type (`note`, `link`, ..., or `dismissal`/`delete`).
    pub push_type: String,
    /// Title-like field.
    pub topic: Option<String>,
    /// Secondary text (link and file bodies).
    pub message: Option<String>,
    /// Main content.
    pub payload: Option<String>,
    /// True when the push was not addressed to a specific device.
    pub for_all: bool,
}

/// Where a canonical field takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Left empty.
    Empty,
    /// A fixed string.
    Literal(&'static str),
    /// A field of the raw record, stringified if structured.
    Field(&'static str),
    /// The record's own `iden`.
    OwnIden,
}

impl Source {
    fn extract(self, push: &RawPush) -> Option<String> {
        match self {
            Source::Empty => None,
            Source::Literal(text) => Some(text.to_string()),
            Source::Field(name) => push.field_text(name),
            Source::OwnIden => push.iden().map(str::to_string),
        }
    }
}

/// Extraction rule for one push type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    /// Source of the topic.
    pub topic: Source,
    /// Source of the payload.
    pub payload: Source,
    /// Source of the message.
    pub message: Source,
}

impl Handler {
    const fn new(topic: Source, payload: Source, message: Source) -> Self {
        Self {
            topic,
            payload,
            message,
        }
    }
}

/// Push type → extraction rule.
pub const HANDLERS: &[(&str, Handler)] = &[
    (
        "clip",
        Handler::new(Source::Literal(TOPIC_CLIPBOARD), Source::Field("body"), Source::Empty),
    ),
    (
        "note",
        Handler::new(Source::Field("title"), Source::Field("body"), Source::Empty),
    ),
    (
        "link",
        Handler::new(Source::Field("title"), Source::Field("url"), Source::Field("body")),
    ),
    (
        "address",
        Handler::new(Source::Field("name"), Source::Field("address"), Source::Empty),
    ),
    (
        "list",
        Handler::new(Source::Field("title"), Source::Field("items"), Source::Empty),
    ),
    (
        "file",
        Handler::new(
            Source::Field("file_name"),
            Source::Field("file_url"),
            Source::Field("body"),
        ),
    ),
    (
        "mirror",
        Handler::new(Source::Field("title"), Source::Field("body"), Source::Empty),
    ),
    (
        "dismissal",
        Handler::new(Source::Literal(TOPIC_DISMISSED), Source::OwnIden, Source::Empty),
    ),
];

/// Look up the extraction rule for a push type.
pub fn handler_for(push_type: &str) -> Option<&'static Handler> {
    HANDLERS
        .iter()
        .find(|(name, _)| *name == push_type)
        .map(|(_, handler)| handler)
}

/// Normalize a raw push.
///
/// Precedence: dismissed flag, then inactive-without-type, then the type
/// table. Device filtering is the caller's job; see
/// [`crate::reconcile::SessionContext::handle_push`].
pub fn normalize(push: &RawPush) -> (Canonical, Disposition) {
    let for_all = push.target_device_iden().is_none();
    let own_iden = push.iden().map(str::to_string);

    if push.is_dismissed() {
        let canonical = Canonical {
            push_type: "dismissal".to_string(),
            topic: Some(TOPIC_DISMISSED.to_string()),
            message: None,
            payload: own_iden,
            for_all,
        };
        return (canonical, Disposition::SuppressedDismissal);
    }

    if push.is_inactive() && push.push_type().is_none() {
        let canonical = Canonical {
            push_type: "delete".to_string(),
            topic: Some(TOPIC_DELETED.to_string()),
            message: None,
            payload: own_iden,
            for_all,
        };
        return (canonical, Disposition::SuppressedDelete);
    }

    let push_type = push.push_type().unwrap_or_default().to_string();
    match handler_for(&push_type) {
        Some(handler) => {
            let canonical = Canonical {
                topic: handler.topic.extract(push),
                message: handler.message.extract(push),
                payload: handler.payload.extract(push),
                push_type,
                for_all,
            };
            (canonical, Disposition::Publish)
        }
        None => {
            let canonical = Canonical {
                push_type,
                topic: None,
                message: None,
                payload: None,
                for_all,
            };
            (canonical, Disposition::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn norm(value: Value) -> (Canonical, Disposition) {
        normalize(&RawPush::from_value(value))
    }

    #[test]
    fn test_dismissed_wins_over_type() {
        for push_type in ["note", "link", "file", "xyz"] {
            let (c, d) = norm(json!({"iden": "p1", "type": push_type, "dismissed": true}));
            assert_eq!(d, Disposition::SuppressedDismissal, "type {push_type}");
            assert_eq!(c.topic.as_deref(), Some(TOPIC_DISMISSED));
            assert_eq!(c.payload.as_deref(), Some("p1"));
            assert_eq!(c.push_type, "dismissal");
        }
    }

    #[test]
    fn test_inactive_without_type_is_delete() {
        let (c, d) = norm(json!({"iden": "p2", "active": false}));
        assert_eq!(d, Disposition::SuppressedDelete);
        assert_eq!(c.topic.as_deref(), Some(TOPIC_DELETED));
        assert_eq!(c.payload.as_deref(), Some("p2"));
        assert_eq!(c.push_type, "delete");
    }

    #[test]
    fn test_inactive_with_type_still_dispatches() {
        let (c, d) = norm(json!({"iden": "p", "active": false, "type": "note", "title": "T"}));
        assert_eq!(d, Disposition::Publish);
        assert_eq!(c.topic.as_deref(), Some("T"));
    }

    #[test]
    fn test_note() {
        let (c, d) = norm(json!({"type": "note", "title": "T", "body": "B"}));
        assert_eq!(d, Disposition::Publish);
        assert_eq!(c.topic.as_deref(), Some("T"));
        assert_eq!(c.payload.as_deref(), Some("B"));
        assert_eq!(c.message, None);
    }

    #[test]
    fn test_link() {
        let (c, d) = norm(json!({"type": "link", "title": "T", "url": "U", "body": "B"}));
        assert_eq!(d, Disposition::Publish);
        assert_eq!(c.topic.as_deref(), Some("T"));
        assert_eq!(c.payload.as_deref(), Some("U"));
        assert_eq!(c.message.as_deref(), Some("B"));
    }

    #[test]
    fn test_clip_uses_fixed_topic() {
        let (c, _) = norm(json!({"type": "clip", "body": "copied"}));
        assert_eq!(c.topic.as_deref(), Some(TOPIC_CLIPBOARD));
        assert_eq!(c.payload.as_deref(), Some("copied"));
    }

    #[test]
    fn test_address() {
        let (c, _) = norm(json!({"type": "address", "name": "Home", "address": "1 Main St"}));
        assert_eq!(c.topic.as_deref(), Some("Home"));
        assert_eq!(c.payload.as_deref(), Some("1 Main St"));
    }

    #[test]
    fn test_list_items_are_serialized() {
        let (c, d) = norm(json!({
            "type": "list",
            "title": "Shopping",
            "items": [{"checked": true, "text": "eggs"}],
        }));
        assert_eq!(d, Disposition::Publish);
        assert_eq!(c.topic.as_deref(), Some("Shopping"));
        assert_eq!(c.payload.as_deref(), Some(r#"[{"checked":true,"text":"eggs"}]"#));
    }

    #[test]
    fn test_file() {
        let (c, _) = norm(json!({
            "type": "file",
            "file_name": "cat.jpg",
            "file_url": "https://dl.example.com/cat.jpg",
            "body": "look",
        }));
        assert_eq!(c.topic.as_deref(), Some("cat.jpg"));
        assert_eq!(c.payload.as_deref(), Some("https://dl.example.com/cat.jpg"));
        assert_eq!(c.message.as_deref(), Some("look"));
    }

    #[test]
    fn test_mirror() {
        let (c, _) = norm(json!({"type": "mirror", "title": "SMS", "body": "hi"}));
        assert_eq!(c.topic.as_deref(), Some("SMS"));
        assert_eq!(c.payload.as_deref(), Some("hi"));
    }

    #[test]
    fn test_dismissal_type() {
        let (c, d) = norm(json!({"type": "dismissal", "iden": "p9"}));
        assert_eq!(d, Disposition::Publish);
        assert_eq!(c.topic.as_deref(), Some(TOPIC_DISMISSED));
        assert_eq!(c.payload.as_deref(), Some("p9"));
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let (c, d) = norm(json!({"type": "xyz", "title": "T"}));
        assert_eq!(d, Disposition::Ignored);
        assert_eq!(c.topic, None);
        assert_eq!(c.payload, None);
    }

    #[test]
    fn test_absent_type_is_ignored() {
        let (_, d) = norm(json!({"iden": "p", "active": true}));
        assert_eq!(d, Disposition::Ignored);
    }

    #[test]
    fn test_for_all_depends_on_target() {
        let (c, _) = norm(json!({"type": "note"}));
        assert!(c.for_all);
        let (c, _) = norm(json!({"type": "note", "target_device_iden": "dev"}));
        assert!(!c.for_all);
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let (c, d) = norm(json!({"type": "note"}));
        assert_eq!(d, Disposition::Publish);
        assert_eq!(c.topic, None);
        assert_eq!(c.payload, None);
    }

    #[test]
    fn test_handler_table_has_unique_types() {
        let mut names: Vec<_> = HANDLERS.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), HANDLERS.len());
        assert!(handler_for("note").is_some());
        assert!(handler_for("delete").is_none());
    }
}
