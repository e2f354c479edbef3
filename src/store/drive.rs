//! REST adapter for a Google-Drive-v3-shaped API.
//!
//! Read-only: folder listings, single-object metadata and media downloads.
//! Everything vendor-specific (query syntax, string-encoded integers, the
//! folder MIME type) stays in this file.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{ByteRange, RemoteContent, RemoteObject, RemotePage, RemoteStore};
use crate::config::UpstreamConfig;
use crate::model::{MediaMetadata, ObjectId};
use crate::{GatewayError, Result};

/// MIME type Drive uses for folders.
pub const DRIVE_FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// User agent string for upstream calls.
const USER_AGENT: &str = concat!("drivegate/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    mime_type: Option<String>,
    // int64 fields arrive as JSON strings.
    size: Option<String>,
    modified_time: Option<DateTime<Utc>>,
    file_extension: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    image_media_metadata: Option<DriveImageMetadata>,
    video_media_metadata: Option<DriveVideoMetadata>,
}

#[derive(Debug, Deserialize)]
struct DriveImageMetadata {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveVideoMetadata {
    width: Option<u32>,
    height: Option<u32>,
    duration_millis: Option<String>,
}

impl From<DriveFile> for RemoteObject {
    fn from(file: DriveFile) -> Self {
        let media = match (file.image_media_metadata, file.video_media_metadata) {
            (_, Some(video)) => Some(MediaMetadata {
                width: video.width,
                height: video.height,
                duration_millis: video.duration_millis.and_then(|d| d.parse().ok()),
            }),
            (Some(image), None) => Some(MediaMetadata {
                width: image.width,
                height: image.height,
                duration_millis: None,
            }),
            (None, None) => None,
        }
        .filter(|m| !m.is_empty());

        RemoteObject {
            id: ObjectId::new(file.id),
            is_folder: file.mime_type.as_deref() == Some(DRIVE_FOLDER_MIME),
            name: file.name,
            mime_type: file.mime_type,
            size: file.size.and_then(|s| s.parse().ok()),
            modified_time: file.modified_time,
            file_extension: file.file_extension,
            media,
            parents: file.parents.into_iter().map(ObjectId::new).collect(),
        }
    }
}

/// Drive REST client.
pub struct DriveStore {
    client: Client,
    base_url: Url,
    access_token: String,
    request_timeout: Duration,
}

impl DriveStore {
    /// Build a client from the upstream configuration.
    ///
    /// No client-wide total timeout is set: downloads may legitimately run
    /// for minutes. Metadata calls get a per-request timeout instead.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| GatewayError::Config(format!("invalid upstream base_url: {}", e)))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
            request_timeout: config.request_timeout(),
        })
    }

    fn files_url(&self, id: Option<&ObjectId>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GatewayError::Config("upstream base_url cannot be a base".into()))?;
            segments.push("files");
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.access_token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.access_token)
        }
    }
}

/// Classify a transport error.
fn map_transport_error(e: reqwest::Error, what: &str) -> GatewayError {
    if e.is_timeout() {
        GatewayError::UpstreamTimeout(what.to_string())
    } else {
        tracing::warn!(error = %e, "Upstream {} failed", what);
        GatewayError::UpstreamUnavailable(format!("{} failed", what))
    }
}

/// Classify a non-success status.
fn map_status(status: StatusCode, what: &str) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound("object".to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            GatewayError::UpstreamUnavailable(format!("{} throttled", what))
        }
        s if s.is_server_error() => {
            GatewayError::UpstreamUnavailable(format!("{} returned {}", what, s.as_u16()))
        }
        s => {
            tracing::error!(status = s.as_u16(), "Upstream rejected {}", what);
            GatewayError::Internal(format!("upstream rejected {} with {}", what, s.as_u16()))
        }
    }
}

/// Total size from a `Content-Range: bytes a-b/total` header.
fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.strip_prefix("bytes ")?.rsplit_once('/')?;
    total.trim().parse().ok()
}

fn list_fields(fields: &[&str]) -> String {
    format!("nextPageToken,files({})", fields.join(","))
}

fn parents_query(folder: &ObjectId) -> String {
    // Drive query strings escape quotes and backslashes.
    let escaped = folder.as_str().replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}' in parents and trashed = false", escaped)
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn list(
        &self,
        folder: &ObjectId,
        fields: &[&str],
        page_token: Option<&str>,
    ) -> Result<RemotePage> {
        let mut url = self.files_url(None)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &parents_query(folder))
                .append_pair("fields", &list_fields(fields))
                .append_pair("supportsAllDrives", "true")
                .append_pair("includeItemsFromAllDrives", "true");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self
            .authorized(self.client.get(url))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, "list"))?;

        if !response.status().is_success() {
            return Err(map_status(response.status(), "list"));
        }

        let list: DriveFileList = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, "list"))?;

        Ok(RemotePage {
            items: list.files.into_iter().map(RemoteObject::from).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn get(&self, id: &ObjectId) -> Result<RemoteObject> {
        let mut url = self.files_url(Some(id))?;
        url.query_pairs_mut()
            .append_pair("fields", &super::GET_FIELDS.join(","))
            .append_pair("supportsAllDrives", "true");

        let response = self
            .authorized(self.client.get(url))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, "get"))?;

        if !response.status().is_success() {
            return Err(map_status(response.status(), "get"));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, "get"))?;
        Ok(file.into())
    }

    async fn get_content(&self, id: &ObjectId, range: Option<ByteRange>) -> Result<RemoteContent> {
        let mut url = self.files_url(Some(id))?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("supportsAllDrives", "true");

        let mut request = self.authorized(self.client.get(url));
        if let Some(range) = range {
            request = request.header(header::RANGE, range.header_value());
        }

        // Only the time to first byte is bounded here; the relay bounds gaps
        // between chunks.
        let response = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| GatewayError::UpstreamTimeout("content".to_string()))?
            .map_err(|e| map_transport_error(e, "content"))?;

        let status = response.status();
        let (range_honored, total_size) = match status {
            StatusCode::PARTIAL_CONTENT => {
                let total = response
                    .headers()
                    .get(header::CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(content_range_total);
                (true, total)
            }
            StatusCode::OK => (false, response.content_length()),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let size = response
                    .headers()
                    .get(header::CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(content_range_total)
                    .unwrap_or(0);
                return Err(GatewayError::RangeNotSatisfiable { size });
            }
            s => return Err(map_status(s, "content")),
        };

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_transport_error(e, "content body")))
            .boxed();

        Ok(RemoteContent {
            body,
            range_honored,
            total_size,
        })
    }
}
