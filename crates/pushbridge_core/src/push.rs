//! Raw push records as delivered by the service.
//!
//! Push objects are heterogeneous: the set of fields depends on the declared
//! `type`, and deleted or dismissed pushes may carry almost nothing. Records are
//! therefore kept as an untyped JSON object with typed accessors for the few
//! fields the bridge itself inspects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An inbound push record, untyped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPush(Map<String, Value>);

impl RawPush {
    /// Wrap a JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from any JSON value. Non-object values yield an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }

    /// The push identifier.
    pub fn iden(&self) -> Option<&str> {
        self.0.get("iden").and_then(Value::as_str)
    }

    /// Declared push type (`note`, `link`, ...), absent for deletion records.
    pub fn push_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Whether the push was dismissed by the user.
    pub fn is_dismissed(&self) -> bool {
        self.0.get("dismissed").and_then(Value::as_bool) == Some(true)
    }

    /// Whether the record explicitly says `active: false`.
    pub fn is_inactive(&self) -> bool {
        self.0.get("active").and_then(Value::as_bool) == Some(false)
    }

    /// Device the push was addressed to, if any.
    pub fn target_device_iden(&self) -> Option<&str> {
        match self.0.get("target_device_iden") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Last modification time (epoch seconds, fractional).
    pub fn modified(&self) -> Option<f64> {
        self.0.get("modified").and_then(Value::as_f64)
    }

    /// Raw field lookup.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Field rendered as a scalar string for the state sink.
    ///
    /// Strings pass through unchanged; null or missing fields yield `None`;
    /// numbers, booleans, arrays and objects are serialized to JSON text.
    pub fn field_text(&self, name: &str) -> Option<String> {
        self.field(name).and_then(value_to_text)
    }

    /// Underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RawPush {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Render a JSON value as sink text.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn push(value: Value) -> RawPush {
        RawPush::from_value(value)
    }

    #[test]
    fn test_accessors() {
        let p = push(json!({
            "iden": "ujpah72o0",
            "type": "note",
            "active": true,
            "dismissed": false,
            "modified": 1412047948.579031,
            "target_device_iden": "ujpah72o0sjAoRsb5VC3c8",
        }));

        assert_eq!(p.iden(), Some("ujpah72o0"));
        assert_eq!(p.push_type(), Some("note"));
        assert!(!p.is_dismissed());
        assert!(!p.is_inactive());
        assert_eq!(p.modified(), Some(1412047948.579031));
        assert_eq!(p.target_device_iden(), Some("ujpah72o0sjAoRsb5VC3c8"));
    }

    #[test]
    fn test_missing_active_is_not_inactive() {
        let p = push(json!({"iden": "a"}));
        assert!(!p.is_inactive());
        assert!(p.push_type().is_none());
    }

    #[test]
    fn test_null_target_is_broadcast() {
        let p = push(json!({"iden": "a", "target_device_iden": null}));
        assert!(p.target_device_iden().is_none());
    }

    #[test]
    fn test_field_text_serializes_structures() {
        let p = push(json!({
            "items": [{"checked": false, "text": "milk"}],
            "count": 3,
            "title": "Groceries",
            "body": null,
        }));

        assert_eq!(
            p.field_text("items").as_deref(),
            Some(r#"[{"checked":false,"text":"milk"}]"#)
        );
        assert_eq!(p.field_text("count").as_deref(), Some("3"));
        assert_eq!(p.field_text("title").as_deref(), Some("Groceries"));
        assert_eq!(p.field_text("body"), None);
        assert_eq!(p.field_text("missing"), None);
    }

    #[test]
    fn test_non_object_value_is_empty() {
        let p = RawPush::from_value(json!("nope"));
        assert!(p.as_map().is_empty());
    }
}
