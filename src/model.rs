//! Core data types shared by the lister, resolver and web layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the remote store assigns to a file or folder.
///
/// Never leaves the server in plaintext; the web layer only ever emits the
/// encrypted form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image/video properties reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Pixel width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Pixel height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Playback length of video content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<u64>,
}

impl MediaMetadata {
    /// True when the store reported nothing useful.
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.duration_millis.is_none()
    }
}

/// Normalized child of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Real identifier of the object.
    pub id: ObjectId,
    /// Name shown to clients.
    pub name: String,
    /// MIME type; folders carry the store's folder type.
    pub mime_type: String,
    /// Size in bytes (0 for folders).
    pub size: u64,
    /// Last modification time, when known.
    pub modified_time: Option<DateTime<Utc>>,
    /// Whether the object is a folder.
    pub is_folder: bool,
    /// Lowercase extension without the dot.
    pub extension: Option<String>,
    /// Media properties for images and video.
    pub media: Option<MediaMetadata>,
}

/// One page of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    /// Children in the order the store returned them.
    pub entries: Vec<DirectoryEntry>,
    /// Cursor for the following page; `None` ends the listing.
    pub next_page_token: Option<String>,
}

/// Metadata of a single object plus its parent link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// The object itself.
    pub entry: DirectoryEntry,
    /// Containing folder, absent for a drive root.
    pub parent: Option<ObjectId>,
}

/// One hop of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreadcrumbItem {
    /// Display name of the folder or file.
    pub label: String,
    /// Client-visible segment addressing it.
    pub segment: String,
}

/// Trail from the root to the resolved location; rebuilt per request.
pub type Breadcrumb = Vec<BreadcrumbItem>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_serializes_transparently() {
        let id = ObjectId::new("1AbC");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1AbC\"");
        let back: ObjectId = serde_json::from_str("\"1AbC\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_media_metadata_is_empty() {
        assert!(MediaMetadata::default().is_empty());
        let media = MediaMetadata {
            width: Some(640),
            ..Default::default()
        };
        assert!(!media.is_empty());
    }
}
