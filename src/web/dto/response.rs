//! Response DTOs.
//!
//! Nothing here carries a real store identifier: folders are addressed by
//! path segments and files by sealed tokens.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{BreadcrumbItem, DirectoryEntry, MediaMetadata};
use crate::path::encode_segment;

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Resolve
// ============================================================================

/// One listed child or the resolved file.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Display name.
    pub name: String,
    /// Segment to append to the current path.
    pub segment: String,
    /// Whether this is a folder.
    pub is_folder: bool,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    /// Lowercase extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Image/video properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaMetadata>,
    /// Sealed identifier for `/stream/{token}`; files only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_token: Option<String>,
}

impl EntryResponse {
    /// Project an entry; `file_token` is the sealed id for files.
    pub fn from_entry(entry: DirectoryEntry, file_token: Option<String>) -> Self {
        Self {
            segment: encode_segment(&entry.name, entry.id.as_str()),
            name: entry.name,
            is_folder: entry.is_folder,
            mime_type: entry.mime_type,
            size: entry.size,
            modified_time: entry.modified_time,
            extension: entry.extension,
            media: entry.media,
            file_token,
        }
    }
}

/// What a resolved path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedKind {
    /// A folder; `entries` is set.
    Folder,
    /// A file; `file` is set.
    File,
}

/// Body of a successful `GET /resolve`.
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    /// Folder or file.
    pub kind: ResolvedKind,
    /// Trail from the root.
    pub breadcrumb: Vec<BreadcrumbItem>,
    /// Folder contents, one page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EntryResponse>>,
    /// The file itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<EntryResponse>,
    /// Always false here; challenges are answered with 401.
    pub protection_required: bool,
    /// Whether a protected folder was unlocked on the way.
    pub protected: bool,
    /// Cursor for the next page of `entries`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// ============================================================================
// Unlock
// ============================================================================

/// Body of a successful `POST /unlock`.
#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    /// Sealed access token for the folder.
    pub access_token: String,
    /// Token type (always "Bearer").
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}
