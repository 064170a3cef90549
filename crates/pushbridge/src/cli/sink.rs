//! JSON-lines state sink: one object per declaration or state write.

use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use pushbridge_core::error::SinkError;
use pushbridge_core::sink::{StateDefinition, StateSink, StateValue};
use serde::Serialize;

#[derive(Serialize)]
struct Declaration<'a> {
    declare: &'a StateDefinition,
}

#[derive(Serialize)]
struct StateWrite<'a> {
    id: &'a str,
    val: &'a StateValue,
    ack: bool,
}

/// Writes state changes as JSON lines to any writer (stdout in the daemon).
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_line<T: Serialize>(&self, value: &T) -> Result<(), String> {
        let line = serde_json::to_string(value).map_err(|e| e.to_string())?;
        let mut out = self.out.lock().map_err(|e| e.to_string())?;
        writeln!(out, "{}", line).map_err(|e| e.to_string())?;
        out.flush().map_err(|e| e.to_string())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> StateSink for JsonLinesSink<W> {
    async fn declare(&self, definitions: &[StateDefinition]) -> Result<(), SinkError> {
        for declare in definitions {
            self.write_line(&Declaration { declare })
                .map_err(SinkError::Declare)?;
        }
        Ok(())
    }

    async fn set_state(&self, id: &str, value: StateValue, ack: bool) -> Result<(), SinkError> {
        self.write_line(&StateWrite {
            id,
            val: &value,
            ack,
        })
        .map_err(|reason| SinkError::Write {
            id: id.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushbridge_core::sink::{PUSH_STATES, STATE_FOR_ALL, STATE_MESSAGE, STATE_TITLE};
    use serde_json::{Value, json};

    fn lines(sink: JsonLinesSink<Vec<u8>>) -> Vec<Value> {
        let out = String::from_utf8(sink.into_inner()).unwrap();
        out.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_state_writes() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.set_state(STATE_TITLE, Some("Door".to_string()).into(), true)
            .await
            .unwrap();
        sink.set_state(STATE_MESSAGE, None.into(), true).await.unwrap();
        sink.set_state(STATE_FOR_ALL, true.into(), true).await.unwrap();

        assert_eq!(
            lines(sink),
            vec![
                json!({"id": "push.title", "val": "Door", "ack": true}),
                json!({"id": "push.message", "val": null, "ack": true}),
                json!({"id": "push.forAll", "val": true, "ack": true}),
            ]
        );
    }

    #[tokio::test]
    async fn test_declarations() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.declare(&PUSH_STATES).await.unwrap();

        let lines = lines(sink);
        assert_eq!(lines.len(), PUSH_STATES.len());
        assert_eq!(lines[0]["declare"]["id"], "push.type");
        assert_eq!(lines[0]["declare"]["name"], "Type of Push");
        assert_eq!(lines[4]["declare"]["type"], "boolean");
    }
}
