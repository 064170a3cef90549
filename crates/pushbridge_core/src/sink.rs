//! State sink: where normalized pushes end up.
//!
//! The host state tree is modelled as a key-value store of scalar states.
//! Every write from the bridge is acknowledged (`ack = true`): it reports a
//! confirmed value, not a pending command.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SinkError;

/// State id of the push type.
pub const STATE_TYPE: &str = "push.type";
/// State id of the push title.
pub const STATE_TITLE: &str = "push.title";
/// State id of the push message.
pub const STATE_MESSAGE: &str = "push.message";
/// State id of the push payload.
pub const STATE_PAYLOAD: &str = "push.payload";
/// State id of the broadcast flag.
pub const STATE_FOR_ALL: &str = "push.forAll";

/// A scalar state value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    /// String state; `None` is written as an explicit null.
    Text(Option<String>),
    /// Boolean state.
    Bool(bool),
}

impl From<Option<String>> for StateValue {
    fn from(value: Option<String>) -> Self {
        StateValue::Text(value)
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

/// Value type of a declared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// String state.
    String,
    /// Boolean state.
    Boolean,
}

/// Declaration of a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateDefinition {
    /// State id.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Value type.
    #[serde(rename = "type")]
    pub kind: StateKind,
    /// Role hint for the host.
    pub role: &'static str,
    /// Readable by the host.
    pub read: bool,
    /// Writable by the host.
    pub write: bool,
}

impl StateDefinition {
    const fn string(id: &'static str, name: &'static str) -> Self {
        Self {
            id,
            name,
            kind: StateKind::String,
            role: "state",
            read: true,
            write: true,
        }
    }
}

/// States the bridge writes.
pub const PUSH_STATES: [StateDefinition; 5] = [
    StateDefinition::string(STATE_TYPE, "Type of Push"),
    StateDefinition::string(STATE_TITLE, "Title of Push"),
    StateDefinition::string(STATE_MESSAGE, "Message of Push"),
    StateDefinition::string(STATE_PAYLOAD, "Content of Push"),
    StateDefinition {
        id: STATE_FOR_ALL,
        name: "Broadcast to all devices",
        kind: StateKind::Boolean,
        role: "indicator",
        read: true,
        write: false,
    },
];

/// Key-value sink for state writes.
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Declare (create or update) state objects. Must be idempotent.
    async fn declare(&self, definitions: &[StateDefinition]) -> Result<(), SinkError>;

    /// Write a state value.
    async fn set_state(&self, id: &str, value: StateValue, ack: bool) -> Result<(), SinkError>;
}

/// A state value with its acknowledgement flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    /// Last written value.
    pub value: StateValue,
    /// Whether the write was acknowledged.
    pub ack: bool,
}

#[derive(Default)]
struct MemoryInner {
    states: BTreeMap<String, StoredState>,
    declared: Vec<StateDefinition>,
    writes: Vec<(String, StateValue)>,
}

/// In-memory sink. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a state.
    pub fn get(&self, id: &str) -> Option<StoredState> {
        self.lock().states.get(id).cloned()
    }

    /// Text value of a string state, flattening "unset" and "null".
    pub fn text(&self, id: &str) -> Option<String> {
        match self.get(id)?.value {
            StateValue::Text(text) => text,
            StateValue::Bool(_) => None,
        }
    }

    /// Every write in order.
    pub fn writes(&self) -> Vec<(String, StateValue)> {
        self.lock().writes.clone()
    }

    /// Number of writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Declared state ids.
    pub fn declared(&self) -> Vec<&'static str> {
        self.lock().declared.iter().map(|d| d.id).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StateSink for MemorySink {
    async fn declare(&self, definitions: &[StateDefinition]) -> Result<(), SinkError> {
        let mut inner = self.lock();
        for def in definitions {
            if let Some(existing) = inner.declared.iter_mut().find(|d| d.id == def.id) {
                *existing = *def;
            } else {
                inner.declared.push(*def);
            }
        }
        Ok(())
    }

    async fn set_state(&self, id: &str, value: StateValue, ack: bool) -> Result<(), SinkError> {
        let mut inner = self.lock();
        inner.writes.push((id.to_string(), value.clone()));
        inner
            .states
            .insert(id.to_string(), StoredState { value, ack });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_writes() {
        let sink = MemorySink::new();
        sink.set_state(STATE_TITLE, Some("T".to_string()).into(), true)
            .await
            .unwrap();
        sink.set_state(STATE_MESSAGE, None::<String>.into(), true)
            .await
            .unwrap();
        sink.set_state(STATE_FOR_ALL, true.into(), true)
            .await
            .unwrap();

        assert_eq!(sink.text(STATE_TITLE).as_deref(), Some("T"));
        assert_eq!(
            sink.get(STATE_MESSAGE),
            Some(StoredState {
                value: StateValue::Text(None),
                ack: true
            })
        );
        assert_eq!(sink.get(STATE_FOR_ALL).unwrap().value, StateValue::Bool(true));
        assert_eq!(sink.write_count(), 3);
    }

    #[tokio::test]
    async fn test_declare_is_idempotent() {
        let sink = MemorySink::new();
        sink.declare(&PUSH_STATES).await.unwrap();
        sink.declare(&PUSH_STATES).await.unwrap();
        assert_eq!(sink.declared().len(), PUSH_STATES.len());
        assert!(sink.declared().contains(&STATE_PAYLOAD));
    }

    #[test]
    fn test_state_value_serializes_as_scalar() {
        assert_eq!(
            serde_json::to_string(&StateValue::Text(Some("x".into()))).unwrap(),
            r#""x""#
        );
        assert_eq!(serde_json::to_string(&StateValue::Text(None)).unwrap(), "null");
        assert_eq!(serde_json::to_string(&StateValue::Bool(false)).unwrap(), "false");
    }
}
