//! Remote object store seam.
//!
//! The gateway treats the cloud drive as the only source of truth and talks
//! to it through [`RemoteStore`]. Adapters translate vendor responses into
//! [`RemoteObject`]s; everything above this module is vendor-neutral.

pub mod drive;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::model::{MediaMetadata, ObjectId};
use crate::Result;

pub use drive::DriveStore;
pub use memory::MemoryStore;

/// Fields a listing needs for the directory entry projection.
pub const LIST_FIELDS: &[&str] = &[
    "id",
    "name",
    "mimeType",
    "size",
    "modifiedTime",
    "fileExtension",
    "imageMediaMetadata(width,height)",
    "videoMediaMetadata(width,height,durationMillis)",
];

/// Fields a single-object lookup needs, parents included.
pub const GET_FIELDS: &[&str] = &[
    "id",
    "name",
    "mimeType",
    "size",
    "modifiedTime",
    "fileExtension",
    "parents",
    "imageMediaMetadata(width,height)",
    "videoMediaMetadata(width,height,durationMillis)",
];

/// Object as reported by the store, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Store identifier.
    pub id: ObjectId,
    /// Raw name.
    pub name: String,
    /// Raw MIME type, if reported.
    pub mime_type: Option<String>,
    /// Size in bytes, if reported.
    pub size: Option<u64>,
    /// Modification time, if reported.
    pub modified_time: Option<DateTime<Utc>>,
    /// Whether the store considers this a folder.
    pub is_folder: bool,
    /// Extension as reported by the store.
    pub file_extension: Option<String>,
    /// Image/video metadata.
    pub media: Option<MediaMetadata>,
    /// Parent folders; only populated by `get`.
    pub parents: Vec<ObjectId>,
}

/// One page of children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePage {
    /// Children in store order.
    pub items: Vec<RemoteObject>,
    /// Opaque cursor for the next page.
    pub next_page_token: Option<String>,
}

/// Inclusive byte window; `end: None` runs to the end of the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: Option<u64>,
}

impl ByteRange {
    /// `bytes=start-end` header value.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Upstream body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Content handed back by `get_content`.
pub struct RemoteContent {
    /// Body chunks, pushed at the store's pace.
    pub body: ByteStream,
    /// Whether the store applied the requested range.
    pub range_honored: bool,
    /// Total object size, when the store reported it.
    pub total_size: Option<u64>,
}

impl std::fmt::Debug for RemoteContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteContent")
            .field("range_honored", &self.range_honored)
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

/// Read-only access to a remote drive.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List one page of a folder's children, requesting only `fields`.
    async fn list(
        &self,
        folder: &ObjectId,
        fields: &[&str],
        page_token: Option<&str>,
    ) -> Result<RemotePage>;

    /// Fetch metadata for one object.
    async fn get(&self, id: &ObjectId) -> Result<RemoteObject>;

    /// Open the object's content, optionally restricted to `range`.
    async fn get_content(&self, id: &ObjectId, range: Option<ByteRange>) -> Result<RemoteContent>;
}
