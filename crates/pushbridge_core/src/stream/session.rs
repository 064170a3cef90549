//! Stream session: connection lifecycle and frame dispatch.
//!
//! ```text
//!   Disconnected ──connect()──▶ Connecting ──ok──▶ Connected
//!        ▲                          │                 │
//!        └──────── error / close() ─┴─────────────────┘
//! ```
//!
//! Every successful connection seeds the history cursor before the first frame
//! is read. Frames are handled one at a time, to completion, so a tickle's
//! reconciliation pass always finishes before the next frame is looked at.
//!
//! [`StreamSession::run`] adds reconnection with exponential backoff on top of
//! the single-connection primitives. [`SessionHandle::close`] stops it from
//! another task, interrupting a pending connect, read, or backoff sleep.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::frame::StreamFrame;
use super::transport::{StreamConnector, StreamMessage, StreamTransport};
use crate::config::ReconnectConfig;
use crate::error::{BridgeError, TransportError};
use crate::reconcile::SessionContext;

/// Connection state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// Connection attempt in flight.
    Connecting,
    /// Connected; frames are being processed.
    Connected,
}

/// Cloneable handle that can close a running session from another task.
#[derive(Clone)]
pub struct SessionHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Ask the session to close. Idempotent, never fails.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether close has been requested.
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// A persistent stream session.
pub struct StreamSession<C: StreamConnector> {
    connector: C,
    url: String,
    reconnect: ReconnectConfig,
    context: SessionContext,
    state: SessionState,
    transport: Option<C::Transport>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Resolves once close has been requested.
async fn closed(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // Sender gone: nobody can close us any more.
            std::future::pending::<()>().await;
        }
    }
}

fn session_closed() -> BridgeError {
    BridgeError::Transport(TransportError::Other("session closed".to_string()))
}

impl<C: StreamConnector> StreamSession<C> {
    /// Create a session in the `Disconnected` state.
    pub fn new(connector: C, url: String, reconnect: ReconnectConfig, context: SessionContext) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            connector,
            url,
            reconnect,
            context,
            state: SessionState::Disconnected,
            transport: None,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Reconciliation context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Handle for closing the session from elsewhere.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shutdown: Arc::clone(&self.shutdown_tx),
        }
    }

    fn is_closed(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Open the stream and seed the history cursor.
    ///
    /// A failed seed is logged and leaves the cursor at zero; only transport
    /// failures (or a close request) make this return an error.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(session_closed());
        }

        self.state = SessionState::Connecting;
        debug!("Connecting to event stream");

        let shutdown = self.shutdown_rx.clone();
        let result = tokio::select! {
            result = self.connector.connect(&self.url) => Some(result),
            _ = closed(shutdown) => None,
        };

        let transport = match result {
            Some(Ok(transport)) => transport,
            None => {
                self.state = SessionState::Disconnected;
                return Err(session_closed());
            }
            Some(Err(e)) => {
                self.state = SessionState::Disconnected;
                return Err(BridgeError::Transport(e));
            }
        };

        self.transport = Some(transport);
        self.state = SessionState::Connected;
        info!("Event stream connected");

        if let Err(e) = self.context.seed().await {
            warn!("Unable to get history: {}", e);
        }
        Ok(())
    }

    /// Read and handle one message.
    ///
    /// Returns `Ok(true)` to keep reading, `Ok(false)` when the stream ended or
    /// the session was closed, and an error when the transport failed.
    pub async fn process_next(&mut self) -> Result<bool, BridgeError> {
        let shutdown = self.shutdown_rx.clone();
        let Some(transport) = self.transport.as_mut() else {
            return Ok(false);
        };

        let message = tokio::select! {
            message = transport.recv() => message,
            _ = closed(shutdown) => return Ok(false),
        };

        match message {
            Some(Ok(StreamMessage::Text(text))) => {
                self.handle_frame(StreamFrame::parse(&text)).await;
                Ok(true)
            }
            Some(Ok(StreamMessage::Close)) | None => Ok(false),
            Some(Ok(other)) => {
                trace!("Ignoring non-text message: {:?}", other);
                Ok(true)
            }
            Some(Err(e)) => Err(BridgeError::Transport(e)),
        }
    }

    /// Dispatch one frame.
    pub async fn handle_frame(&mut self, frame: StreamFrame) {
        if self.state != SessionState::Connected {
            debug!("Dropping frame while {:?}: {:?}", self.state, frame);
            return;
        }

        if frame.is_push_tickle() {
            debug!("Push tickle received");
            match self.context.reconcile().await {
                Ok(outcome) => debug!(
                    "Reconciled {} pushes ({} published), cursor {}",
                    outcome.fetched,
                    outcome.published,
                    outcome.cursor.value()
                ),
                Err(e) => warn!("{}", e),
            }
        } else if let Some(push) = frame.inline_push() {
            self.context.handle_push(&push).await;
        } else if frame == StreamFrame::Nop {
            trace!("nop");
        } else {
            debug!("Ignoring frame {:?}", frame);
        }
    }

    /// Run until closed, reconnecting with backoff after failures.
    pub async fn run(&mut self) {
        let mut attempt: u32 = 0;

        while !self.is_closed() {
            if attempt > 0 {
                if !self.reconnect.allows(attempt) {
                    warn!("Giving up after {} reconnection attempts", attempt - 1);
                    break;
                }
                let delay = self.reconnect.delay_for(attempt);
                info!(
                    "Reconnecting in {}s (attempt {})",
                    delay.as_secs(),
                    attempt
                );
                let shutdown = self.shutdown_rx.clone();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = closed(shutdown) => break,
                }
            }

            if let Err(e) = self.connect().await {
                if self.is_closed() {
                    break;
                }
                warn!("{}", e);
                attempt += 1;
                continue;
            }
            attempt = 0;

            loop {
                match self.process_next().await {
                    Ok(true) => {}
                    Ok(false) => {
                        if !self.is_closed() {
                            info!("Event stream ended");
                        }
                        break;
                    }
                    Err(e) => {
                        warn!("ERROR: {}", e);
                        break;
                    }
                }
            }

            self.release_transport().await;
            attempt += 1;
        }

        self.release_transport().await;
        debug!("Stream session stopped");
    }

    /// Close the session. Safe in any state; never fails.
    pub async fn close(&mut self) {
        self.shutdown_tx.send_replace(true);
        self.release_transport().await;
        info!("Stream session closed");
    }

    async fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            debug!("Error closing stream: {}", e);
        }
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EndpointIdentity;
    use crate::sink::{MemorySink, STATE_PAYLOAD, STATE_TITLE};
    use crate::test_utils::{FakePushApi, ScriptedConnector};
    use serde_json::json;

    fn session(
        api: &FakePushApi,
        sink: &MemorySink,
        connector: ScriptedConnector,
    ) -> StreamSession<ScriptedConnector> {
        let context = SessionContext::new(
            Arc::new(api.clone()),
            Arc::new(sink.clone()),
            EndpointIdentity::new("me"),
            true,
        );
        StreamSession::new(
            connector,
            "wss://stream.test/websocket/key".to_string(),
            ReconnectConfig::default(),
            context,
        )
    }

    fn raw(value: serde_json::Value) -> crate::push::RawPush {
        crate::push::RawPush::from_value(value)
    }

    #[tokio::test]
    async fn test_connect_seeds_cursor() {
        let api = FakePushApi::new();
        api.queue_history(Ok(vec![raw(json!({"type": "note", "modified": 500.0}))]));
        let connector = ScriptedConnector::new();
        let _feed = connector.push_connection();
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, connector.clone());

        assert_eq!(s.state(), SessionState::Disconnected);
        s.connect().await.unwrap();

        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(s.context().cursor().value(), 500.0);
        assert_eq!(connector.urls(), vec!["wss://stream.test/websocket/key".to_string()]);
    }

    #[tokio::test]
    async fn test_seed_failure_is_not_fatal() {
        let api = FakePushApi::new();
        api.queue_history_failure("offline");
        let connector = ScriptedConnector::new();
        let _feed = connector.push_connection();
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, connector);

        s.connect().await.unwrap();
        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(s.context().cursor().value(), 0.0);
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_disconnected() {
        let api = FakePushApi::new();
        let connector = ScriptedConnector::new();
        connector.push_failure("refused");
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, connector);

        let err = s.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_tickle_reconciles_and_push_frame_is_inline() {
        let api = FakePushApi::new();
        api.queue_history(Ok(vec![])); // seed
        api.queue_history(Ok(vec![raw(json!({
            "iden": "h1", "type": "note", "title": "From history", "body": "b", "modified": 10.0
        }))]));
        let connector = ScriptedConnector::new();
        let feed = connector.push_connection();
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, connector);
        s.connect().await.unwrap();

        feed.send_json(json!({"type": "tickle", "subtype": "push"}));
        assert!(s.process_next().await.unwrap());
        assert_eq!(sink.text(STATE_TITLE).as_deref(), Some("From history"));
        assert_eq!(s.context().cursor().value(), 10.0);

        feed.send_json(json!({"type": "push", "push": {"type": "mirror", "title": "SMS", "body": "hi"}}));
        assert!(s.process_next().await.unwrap());
        assert_eq!(sink.text(STATE_PAYLOAD).as_deref(), Some("hi"));
        // Inline pushes do not touch the cursor.
        assert_eq!(s.context().cursor().value(), 10.0);
        assert_eq!(api.history_queries().len(), 2);
    }

    #[tokio::test]
    async fn test_other_frames_are_noops() {
        let api = FakePushApi::new();
        let connector = ScriptedConnector::new();
        let feed = connector.push_connection();
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, connector);
        s.connect().await.unwrap();

        feed.send_json(json!({"type": "nop"}));
        feed.send_json(json!({"type": "tickle", "subtype": "device"}));
        feed.send_text("garbage");
        for _ in 0..3 {
            assert!(s.process_next().await.unwrap());
        }

        assert_eq!(sink.write_count(), 0);
        // Only the seed query was made.
        assert_eq!(api.history_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_end_and_error() {
        let api = FakePushApi::new();
        let connector = ScriptedConnector::new();
        let feed = connector.push_connection();
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, connector);
        s.connect().await.unwrap();

        feed.send_error("connection reset");
        assert!(matches!(
            s.process_next().await,
            Err(BridgeError::Transport(_))
        ));

        drop(feed);
        assert!(!s.process_next().await.unwrap());
    }

    #[tokio::test]
    async fn test_close_before_connect_is_safe() {
        let api = FakePushApi::new();
        let connector = ScriptedConnector::new();
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, connector.clone());

        s.close().await;
        s.close().await;
        assert_eq!(s.state(), SessionState::Disconnected);

        assert!(s.connect().await.is_err());
        assert!(connector.urls().is_empty());
    }

    #[tokio::test]
    async fn test_frames_dropped_when_not_connected() {
        let api = FakePushApi::new();
        let sink = MemorySink::new();
        let mut s = session(&api, &sink, ScriptedConnector::new());

        s.handle_frame(StreamFrame::Tickle {
            subtype: Some("push".to_string()),
        })
        .await;
        assert!(api.history_queries().is_empty());
    }
}
