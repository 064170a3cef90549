//! Test utilities for pushbridge_core
//!
//! Scripted stand-ins for the service API and the event stream. Both are
//! cheap to clone and share their state, so a test can keep a handle for
//! assertions after handing a clone to the code under test.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::api::{Device, HistoryQuery, OutboundPush, PushApi, Target, UploadedFile};
use crate::error::{ApiError, TransportError};
use crate::push::RawPush;
use crate::stream::{StreamConnector, StreamMessage, StreamTransport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct FakeState {
    devices: Vec<Device>,
    created: Vec<String>,
    fail_list_devices: bool,
    history: VecDeque<Result<Vec<RawPush>, ApiError>>,
    queries: Vec<HistoryQuery>,
    deleted: Vec<String>,
    fail_delete: HashSet<String>,
    sent: Vec<OutboundPush>,
    fail_send: HashSet<String>,
    uploads: Vec<PathBuf>,
}

/// In-memory [`PushApi`] with scripted history responses.
///
/// History queries are answered from a queue; once it is drained every query
/// returns an empty batch.
#[derive(Clone, Default)]
pub struct FakePushApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakePushApi {
    /// Create an empty fake account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device to the account (builder pattern).
    pub fn with_device(self, device: Device) -> Self {
        lock(&self.state).devices.push(device);
        self
    }

    /// Make `list_devices` fail.
    pub fn fail_list_devices(&self, fail: bool) {
        lock(&self.state).fail_list_devices = fail;
    }

    /// Nicknames passed to `create_device`, in order.
    pub fn created_devices(&self) -> Vec<String> {
        lock(&self.state).created.clone()
    }

    /// Queue the response to the next history query.
    pub fn queue_history(&self, response: Result<Vec<RawPush>, ApiError>) {
        lock(&self.state).history.push_back(response);
    }

    /// Queue a failed history query.
    pub fn queue_history_failure(&self, reason: &str) {
        self.queue_history(Err(ApiError::Request(reason.to_string())));
    }

    /// History queries received, in order.
    pub fn history_queries(&self) -> Vec<HistoryQuery> {
        lock(&self.state).queries.clone()
    }

    /// Make deleting `iden` fail.
    pub fn fail_delete(&self, iden: &str) {
        lock(&self.state).fail_delete.insert(iden.to_string());
    }

    /// Successfully deleted push idens, in order.
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }

    /// Make sends to `receiver` (device iden or email) fail.
    pub fn fail_send_to(&self, receiver: &str) {
        lock(&self.state).fail_send.insert(receiver.to_string());
    }

    /// Successfully sent pushes, in order.
    pub fn sent(&self) -> Vec<OutboundPush> {
        lock(&self.state).sent.clone()
    }

    /// Paths passed to `upload_file`.
    pub fn uploads(&self) -> Vec<PathBuf> {
        lock(&self.state).uploads.clone()
    }
}

#[async_trait]
impl PushApi for FakePushApi {
    async fn list_devices(&self) -> Result<Vec<Device>, ApiError> {
        let state = lock(&self.state);
        if state.fail_list_devices {
            return Err(ApiError::Request("list devices failed".to_string()));
        }
        Ok(state.devices.clone())
    }

    async fn create_device(&self, nickname: &str) -> Result<Device, ApiError> {
        let mut state = lock(&self.state);
        state.created.push(nickname.to_string());
        let device = Device {
            iden: format!("created-{}", state.created.len()),
            nickname: Some(nickname.to_string()),
            kind: Some("stream".to_string()),
            active: true,
        };
        state.devices.push(device.clone());
        Ok(device)
    }

    async fn history(&self, query: HistoryQuery) -> Result<Vec<RawPush>, ApiError> {
        let mut state = lock(&self.state);
        state.queries.push(query);
        state.history.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete_push(&self, iden: &str) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        if state.fail_delete.contains(iden) {
            return Err(ApiError::Status {
                status: 404,
                body: "not found".to_string(),
            });
        }
        state.deleted.push(iden.to_string());
        Ok(())
    }

    async fn send_push(&self, push: &OutboundPush) -> Result<RawPush, ApiError> {
        let mut state = lock(&self.state);
        let receiver = match &push.target {
            Target::All => "",
            Target::Device(iden) => iden.as_str(),
            Target::Email(email) => email.as_str(),
        };
        if state.fail_send.contains(receiver) {
            return Err(ApiError::Status {
                status: 400,
                body: format!("invalid receiver {}", receiver),
            });
        }
        state.sent.push(push.clone());

        let mut created = push.to_json();
        if let Value::Object(map) = &mut created {
            map.insert("iden".to_string(), json!(format!("sent-{}", state.sent.len())));
        }
        Ok(RawPush::from_value(created))
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, ApiError> {
        lock(&self.state).uploads.push(path.to_path_buf());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::File(format!("not a file: {}", path.display())))?;
        Ok(UploadedFile {
            file_url: format!("https://files.test/{}", file_name),
            file_type: "application/octet-stream".to_string(),
            file_name,
        })
    }
}

type Feed = Result<StreamMessage, TransportError>;

/// Sending half of a scripted stream connection.
///
/// Dropping it ends the stream on the receiving side.
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<Feed>,
}

impl StreamFeed {
    /// Deliver a text frame.
    pub fn send_text(&self, text: &str) {
        let _ = self.tx.send(Ok(StreamMessage::Text(text.to_string())));
    }

    /// Deliver a JSON frame.
    pub fn send_json(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    /// Deliver a transport error.
    pub fn send_error(&self, reason: &str) {
        let _ = self.tx.send(Err(TransportError::Stream(reason.to_string())));
    }

    /// Deliver a close frame.
    pub fn send_close(&self) {
        let _ = self.tx.send(Ok(StreamMessage::Close));
    }
}

/// Connection produced by [`ScriptedConnector`].
pub struct ScriptedTransport {
    rx: mpsc::UnboundedReceiver<Feed>,
    closed: Arc<Mutex<usize>>,
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn recv(&mut self) -> Option<Result<StreamMessage, TransportError>> {
        self.rx.recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.rx.close();
        *lock(&self.closed) += 1;
        Ok(())
    }
}

enum Scripted {
    Connect(mpsc::UnboundedReceiver<Feed>),
    Fail(String),
}

#[derive(Default)]
struct ConnectorState {
    script: VecDeque<Scripted>,
    urls: Vec<String>,
}

/// [`StreamConnector`] that plays back a queue of connection outcomes.
///
/// Connecting past the end of the queue fails.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ConnectorState>>,
    closed: Arc<Mutex<usize>>,
}

impl ScriptedConnector {
    /// Create a connector with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful connection and return its feed.
    pub fn push_connection(&self) -> StreamFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state).script.push_back(Scripted::Connect(rx));
        StreamFeed { tx }
    }

    /// Script a failed connection attempt.
    pub fn push_failure(&self, reason: &str) {
        lock(&self.state)
            .script
            .push_back(Scripted::Fail(reason.to_string()));
    }

    /// URLs of every connection attempt so far.
    pub fn urls(&self) -> Vec<String> {
        lock(&self.state).urls.clone()
    }

    /// Number of connections closed by the session.
    pub fn closed_count(&self) -> usize {
        *lock(&self.closed)
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError> {
        let next = {
            let mut state = lock(&self.state);
            state.urls.push(url.to_string());
            state.script.pop_front()
        };
        match next {
            Some(Scripted::Connect(rx)) => Ok(ScriptedTransport {
                rx,
                closed: Arc::clone(&self.closed),
            }),
            Some(Scripted::Fail(reason)) => Err(TransportError::ConnectionFailed(reason)),
            None => Err(TransportError::ConnectionFailed(
                "no scripted connection".to_string(),
            )),
        }
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
