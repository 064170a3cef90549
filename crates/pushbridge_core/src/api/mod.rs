//! Remote push service API.
//!
//! [`PushApi`] is the seam between the bridge and the service's REST
//! interface. The native build provides [`HttpPushApi`]; tests use the scripted
//! fake in [`crate::test_utils`].

#[cfg(feature = "native")]
mod http;

#[cfg(feature = "native")]
pub use http::HttpPushApi;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ApiError;
use crate::push::RawPush;

/// A device registered on the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier.
    pub iden: String,
    /// Display name.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Device type (`android`, `chrome`, `stream`, ...).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Deleted devices are reported with `active: false`.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// `GET /devices` response body.
#[derive(Debug, Deserialize)]
pub struct DeviceList {
    /// Devices on the account.
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// `GET /pushes` response body.
#[derive(Debug, Deserialize)]
pub struct PushList {
    /// Pushes, newest first.
    #[serde(default)]
    pub pushes: Vec<RawPush>,
}

/// Parameters of a history query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryQuery {
    /// Only pushes modified after this timestamp.
    pub modified_after: Option<f64>,
    /// Maximum number of pushes to return.
    pub limit: Option<u32>,
}

impl HistoryQuery {
    /// Everything modified after `cursor`.
    pub fn since(cursor: f64) -> Self {
        Self {
            modified_after: Some(cursor),
            limit: None,
        }
    }

    /// Only the newest `limit` pushes.
    pub fn latest(limit: u32) -> Self {
        Self {
            modified_after: None,
            limit: Some(limit),
        }
    }

    /// Query-string pairs.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(modified_after) = self.modified_after {
            params.push(("modified_after", modified_after.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Who an outbound push is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every device on the account.
    All,
    /// A single device by iden.
    Device(String),
    /// A user by email address.
    Email(String),
}

impl Target {
    /// Interpret a receiver string: addresses containing `@` are emails,
    /// anything else non-empty is a device iden, blank means all devices.
    pub fn parse(receiver: &str) -> Self {
        let receiver = receiver.trim();
        if receiver.is_empty() {
            Target::All
        } else if receiver.contains('@') {
            Target::Email(receiver.to_string())
        } else {
            Target::Device(receiver.to_string())
        }
    }

    fn apply(&self, body: &mut Map<String, Value>) {
        match self {
            Target::All => {}
            Target::Device(iden) => {
                body.insert("device_iden".to_string(), Value::String(iden.clone()));
            }
            Target::Email(email) => {
                body.insert("email".to_string(), Value::String(email.clone()));
            }
        }
    }
}

/// A file that has been uploaded and can be referenced by a file push.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    /// File name as shown to receivers.
    pub file_name: String,
    /// MIME type.
    pub file_type: String,
    /// Download URL.
    pub file_url: String,
}

/// Content of an outbound push.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// Plain note.
    Note {
        /// Title.
        title: String,
        /// Body text.
        body: Option<String>,
    },
    /// Link with optional text.
    Link {
        /// Title.
        title: String,
        /// Target URL.
        url: String,
        /// Body text.
        body: Option<String>,
    },
    /// Previously uploaded file.
    File {
        /// Upload result.
        file: UploadedFile,
        /// Body text.
        body: Option<String>,
    },
}

/// A push to create on the service.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPush {
    /// Addressee.
    pub target: Target,
    /// Content.
    pub body: OutboundBody,
}

impl OutboundPush {
    /// JSON request body for `POST /pushes`.
    pub fn to_json(&self) -> Value {
        let mut body = match &self.body {
            OutboundBody::Note { title, body } => json!({
                "type": "note",
                "title": title,
                "body": body,
            }),
            OutboundBody::Link { title, url, body } => json!({
                "type": "link",
                "title": title,
                "url": url,
                "body": body,
            }),
            OutboundBody::File { file, body } => json!({
                "type": "file",
                "file_name": file.file_name,
                "file_type": file.file_type,
                "file_url": file.file_url,
                "body": body,
            }),
        };

        if let Value::Object(map) = &mut body {
            map.retain(|_, v| !v.is_null());
            self.target.apply(map);
        }
        body
    }
}

/// Operations the bridge needs from the push service.
#[async_trait]
pub trait PushApi: Send + Sync {
    /// List devices on the account.
    async fn list_devices(&self) -> Result<Vec<Device>, ApiError>;

    /// Register a new stream device with the given nickname.
    async fn create_device(&self, nickname: &str) -> Result<Device, ApiError>;

    /// Fetch push history, newest first.
    async fn history(&self, query: HistoryQuery) -> Result<Vec<RawPush>, ApiError>;

    /// Delete a push by iden.
    async fn delete_push(&self, iden: &str) -> Result<(), ApiError>;

    /// Create a push. Returns the created record.
    async fn send_push(&self, push: &OutboundPush) -> Result<RawPush, ApiError>;

    /// Upload a local file so it can be sent as a file push.
    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, ApiError>;
}
