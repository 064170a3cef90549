//! Outbound relay: fan a local message out to one or more receivers.
//!
//! A message is either a bare string (sent as a note with the default title)
//! or an object naming the kind, title, text, link or file, and optionally its
//! own receivers. Each receiver is sent to independently; one failing does not
//! stop the others.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{OutboundBody, OutboundPush, PushApi, Target, UploadedFile};
use crate::config::split_receivers;
use crate::error::{ApiError, BridgeError};

/// Kind of outbound push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    /// Text note.
    Note,
    /// Link.
    Link,
    /// File upload.
    File,
}

impl OutboundKind {
    /// Anything that is not `link` or `file` is sent as a note.
    pub fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("link") => OutboundKind::Link,
            Some("file") => OutboundKind::File,
            _ => OutboundKind::Note,
        }
    }
}

/// A message to relay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// `note`, `link` or `file`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Title; the default title is used when absent.
    #[serde(default)]
    pub title: Option<String>,
    /// Body text.
    #[serde(default)]
    pub message: Option<String>,
    /// URL for link pushes.
    #[serde(default)]
    pub link: Option<String>,
    /// Local path for file pushes.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Comma-separated receivers overriding the configured ones.
    #[serde(default)]
    pub receiver: Option<String>,
}

impl OutboundMessage {
    /// A plain note.
    pub fn note(message: impl Into<String>) -> Self {
        Self {
            kind: Some("note".to_string()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Interpret a JSON value: strings (and other scalars) become notes,
    /// objects are read field by field.
    pub fn from_value(value: Value) -> Result<Self, BridgeError> {
        match value {
            Value::Object(_) => serde_json::from_value(value).map_err(|e| {
                BridgeError::OutboundSend {
                    receiver: String::new(),
                    source: ApiError::Malformed(e.to_string()),
                }
            }),
            Value::String(text) => Ok(Self::note(text)),
            other => Ok(Self::note(other.to_string())),
        }
    }

    /// Parse text that is either a JSON object or a bare message.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => Self::from_value(value),
            _ => Ok(Self::note(text)),
        }
    }

    /// Declared kind.
    pub fn kind(&self) -> OutboundKind {
        OutboundKind::parse(self.kind.as_deref())
    }

    /// Receivers for this message: its own list if given, else `defaults`.
    pub fn receivers(&self, defaults: &[String]) -> Vec<String> {
        match &self.receiver {
            Some(receiver) => split_receivers(receiver),
            None => defaults.to_vec(),
        }
    }
}

/// Result of sending to one receiver.
#[derive(Debug)]
pub struct Delivery {
    /// Receiver as given (empty for "all devices").
    pub receiver: String,
    /// Created push iden, or the failure.
    pub result: Result<Option<String>, BridgeError>,
}

/// Per-receiver outcomes of one relay call.
#[derive(Debug, Default)]
pub struct RelayReport {
    /// One entry per receiver, in receiver order.
    pub deliveries: Vec<Delivery>,
}

impl RelayReport {
    /// Number of successful sends.
    pub fn succeeded(&self) -> usize {
        self.deliveries.iter().filter(|d| d.result.is_ok()).count()
    }

    /// Failed deliveries.
    pub fn failures(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| d.result.is_err())
    }

    /// Whether every receiver succeeded.
    pub fn all_ok(&self) -> bool {
        self.deliveries.iter().all(|d| d.result.is_ok())
    }
}

/// Sends outbound messages through a [`PushApi`].
pub struct Relay {
    api: Arc<dyn PushApi>,
    receivers: Vec<String>,
    default_title: String,
}

impl Relay {
    /// Create a relay with default receivers and title.
    pub fn new(api: Arc<dyn PushApi>, receivers: Vec<String>, default_title: impl Into<String>) -> Self {
        Self {
            api,
            receivers,
            default_title: default_title.into(),
        }
    }

    /// Send `message` to each of its receivers.
    ///
    /// Only a failed file upload aborts the whole call, since there is
    /// nothing to send to anyone. Per-receiver failures land in the report.
    pub async fn send(&self, message: &OutboundMessage) -> Result<RelayReport, BridgeError> {
        let kind = message.kind();
        let title = message
            .title
            .clone()
            .unwrap_or_else(|| self.default_title.clone());

        let mut receivers = message.receivers(&self.receivers);
        if receivers.is_empty() {
            // No receiver configured: address every device on the account.
            receivers.push(String::new());
        }
        info!("Relaying {:?} to {} receiver(s)", kind, receivers.len());

        let uploaded = match kind {
            OutboundKind::File => Some(self.upload(message).await?),
            _ => None,
        };
        let body = build_body(kind, title, message, uploaded);

        let sends = receivers.into_iter().map(|receiver| {
            let push = OutboundPush {
                target: Target::parse(&receiver),
                body: body.clone(),
            };
            async move {
                let result = match self.api.send_push(&push).await {
                    Ok(created) => {
                        debug!("Sent push to {:?}", receiver);
                        Ok(created.iden().map(str::to_string))
                    }
                    Err(source) => {
                        let err = BridgeError::OutboundSend {
                            receiver: receiver.clone(),
                            source,
                        };
                        warn!("Pushbullet error: {}", err);
                        Err(err)
                    }
                };
                Delivery { receiver, result }
            }
        });

        Ok(RelayReport {
            deliveries: join_all(sends).await,
        })
    }

    async fn upload(&self, message: &OutboundMessage) -> Result<UploadedFile, BridgeError> {
        let upload_failed = |source| BridgeError::OutboundSend {
            receiver: String::new(),
            source,
        };
        let path = message
            .file
            .as_deref()
            .ok_or_else(|| upload_failed(ApiError::File("file push without a file".to_string())))?;
        self.api.upload_file(path).await.map_err(upload_failed)
    }
}

fn build_body(
    kind: OutboundKind,
    title: String,
    message: &OutboundMessage,
    uploaded: Option<UploadedFile>,
) -> OutboundBody {
    match (kind, uploaded) {
        (OutboundKind::Link, _) => OutboundBody::Link {
            title,
            url: message.link.clone().unwrap_or_default(),
            body: message.message.clone(),
        },
        // A file push has no title field; the title travels as the body.
        (OutboundKind::File, Some(file)) => OutboundBody::File {
            file,
            body: Some(title),
        },
        _ => OutboundBody::Note {
            title,
            body: message.message.clone(),
        },
    }
}
