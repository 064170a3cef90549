//! Pushbullet REST API client over `reqwest`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::{Device, DeviceList, HistoryQuery, OutboundPush, PushApi, PushList, UploadedFile};
use crate::error::ApiError;
use crate::push::RawPush;

/// REST client for the push service.
pub struct HttpPushApi {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// `POST /upload-request` response.
#[derive(Debug, serde::Deserialize)]
struct UploadRequest {
    file_name: String,
    file_type: String,
    file_url: String,
    upload_url: String,
}

impl HttpPushApi {
    /// Create a client for `base_url` authenticated with `api_key`.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, ApiError> {
        let resp = Self::check(resp, what).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Malformed(format!("{}: {}", what, e)))
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, ApiError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        warn!("{} failed: {} {}", what, status, body);
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn request_failed(what: &str) -> impl FnOnce(reqwest::Error) -> ApiError + '_ {
    move |e| ApiError::Request(format!("{} request failed: {}", what, e))
}

#[async_trait]
impl PushApi for HttpPushApi {
    async fn list_devices(&self) -> Result<Vec<Device>, ApiError> {
        let resp = self
            .client
            .get(self.url("devices"))
            .header("Access-Token", &self.api_key)
            .query(&[("active", "true")])
            .send()
            .await
            .map_err(request_failed("GET devices"))?;
        let list: DeviceList = Self::read_json(resp, "GET devices").await?;
        debug!("Listed {} devices", list.devices.len());
        Ok(list.devices)
    }

    async fn create_device(&self, nickname: &str) -> Result<Device, ApiError> {
        let resp = self
            .client
            .post(self.url("devices"))
            .header("Access-Token", &self.api_key)
            .json(&json!({"nickname": nickname, "type": "stream"}))
            .send()
            .await
            .map_err(request_failed("POST devices"))?;
        Self::read_json(resp, "POST devices").await
    }

    async fn history(&self, query: HistoryQuery) -> Result<Vec<RawPush>, ApiError> {
        let resp = self
            .client
            .get(self.url("pushes"))
            .header("Access-Token", &self.api_key)
            .query(&query.to_params())
            .send()
            .await
            .map_err(request_failed("GET pushes"))?;
        let list: PushList = Self::read_json(resp, "GET pushes").await?;
        Ok(list.pushes)
    }

    async fn delete_push(&self, iden: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .delete(self.url(&format!("pushes/{}", iden)))
            .header("Access-Token", &self.api_key)
            .send()
            .await
            .map_err(request_failed("DELETE push"))?;
        Self::check(resp, "DELETE push").await?;
        Ok(())
    }

    async fn send_push(&self, push: &OutboundPush) -> Result<RawPush, ApiError> {
        let resp = self
            .client
            .post(self.url("pushes"))
            .header("Access-Token", &self.api_key)
            .json(&push.to_json())
            .send()
            .await
            .map_err(request_failed("POST pushes"))?;
        Self::read_json(resp, "POST pushes").await
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::File(format!("not a file path: {}", path.display())))?
            .to_string();
        let file_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::File(format!("{}: {}", path.display(), e)))?;

        let resp = self
            .client
            .post(self.url("upload-request"))
            .header("Access-Token", &self.api_key)
            .json(&json!({"file_name": file_name, "file_type": file_type}))
            .send()
            .await
            .map_err(request_failed("POST upload-request"))?;
        let upload: UploadRequest = Self::read_json(resp, "POST upload-request").await?;

        let part = Part::bytes(contents)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.file_type)
            .map_err(|e| ApiError::File(format!("invalid MIME type {}: {}", upload.file_type, e)))?;
        let resp = self
            .client
            .post(&upload.upload_url)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(request_failed("file upload"))?;
        Self::check(resp, "file upload").await?;

        debug!("Uploaded {} as {}", upload.file_name, upload.file_url);
        Ok(UploadedFile {
            file_name: upload.file_name,
            file_type: upload.file_type,
            file_url: upload.file_url,
        })
    }
}
