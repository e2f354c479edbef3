//! Directory listing with a read-through cache.
//!
//! Pages are normalized into [`DirectoryEntry`]s and cached under
//! `(operation, folder, cursor)` keys. Concurrent misses for one key share a
//! single upstream call; transient failures are retried per [`RetryPolicy`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{self, CacheStore, SingleFlight};
use crate::model::{DirectoryEntry, ListPage, ObjectId, ObjectMeta};
use crate::retry::RetryPolicy;
use crate::store::{RemoteObject, RemoteStore, LIST_FIELDS};
use crate::{GatewayError, Result};

/// MIME type reported for folders the store did not type.
const FALLBACK_FOLDER_MIME: &str = "inode/directory";

/// Convert a raw store object into the client-facing projection.
pub fn normalize(object: RemoteObject) -> DirectoryEntry {
    let extension = if object.is_folder {
        None
    } else {
        object
            .file_extension
            .filter(|e| !e.is_empty())
            .or_else(|| extension_of(&object.name))
            .map(|e| e.to_ascii_lowercase())
    };

    let mime_type = match object.mime_type.filter(|m| !m.is_empty()) {
        Some(mime) => mime,
        None if object.is_folder => FALLBACK_FOLDER_MIME.to_string(),
        None => mime_guess::from_path(&object.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };

    DirectoryEntry {
        id: object.id,
        size: if object.is_folder {
            0
        } else {
            object.size.unwrap_or(0)
        },
        name: object.name,
        mime_type,
        modified_time: object.modified_time,
        is_folder: object.is_folder,
        extension,
        media: object.media.filter(|m| !m.is_empty()),
    }
}

fn extension_of(name: &str) -> Option<String> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_string()),
        _ => None,
    }
}

/// Paginated, cached access to folder contents.
pub struct DirectoryLister {
    store: Arc<dyn RemoteStore>,
    cache: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
    retry: RetryPolicy,
    page_flights: SingleFlight<ListPage>,
    meta_flights: SingleFlight<ObjectMeta>,
}

impl DirectoryLister {
    /// Create a lister; `cache: None` disables caching.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        cache: Option<Arc<dyn CacheStore>>,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            cache,
            ttl,
            retry,
            page_flights: SingleFlight::new(),
            meta_flights: SingleFlight::new(),
        }
    }

    /// Retry policy used for upstream reads.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.as_ref()?.get(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// One page of `folder`'s children.
    pub async fn list(&self, folder: &ObjectId, page_token: Option<&str>) -> Result<ListPage> {
        let key = cache::list_key(folder.as_str(), page_token);
        if let Some(page) = self.cached::<ListPage>(&key).await {
            tracing::trace!(folder = %folder, "Listing cache hit");
            return Ok(page);
        }

        let store = self.store.clone();
        let cache = self.cache.clone();
        let ttl = self.ttl;
        let retry = self.retry;
        let folder = folder.clone();
        let token = page_token.map(str::to_string);
        let cache_key = key.clone();

        self.page_flights
            .run(&key, async move {
                let page = retry
                    .run("list", || store.list(&folder, LIST_FIELDS, token.as_deref()))
                    .await?;
                let page = ListPage {
                    entries: page.items.into_iter().map(normalize).collect(),
                    next_page_token: page.next_page_token,
                };
                write_through(cache.as_deref(), &cache_key, &page, ttl).await;
                Ok(page)
            })
            .await
    }

    /// Every child of `folder`, following cursors to the end.
    pub async fn list_all(&self, folder: &ObjectId) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.list(folder, token.as_deref()).await?;
            entries.extend(page.entries);
            match page.next_page_token {
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        tracing::warn!(folder = %folder, "Upstream repeated a pagination cursor");
                        return Err(GatewayError::UpstreamUnavailable(
                            "pagination cursor repeated".to_string(),
                        ));
                    }
                    token = Some(next);
                }
                None => return Ok(entries),
            }
        }
    }

    /// Metadata and parent link of one object.
    pub async fn get(&self, id: &ObjectId) -> Result<ObjectMeta> {
        let key = cache::meta_key(id.as_str());
        if let Some(meta) = self.cached::<ObjectMeta>(&key).await {
            return Ok(meta);
        }

        let store = self.store.clone();
        let cache = self.cache.clone();
        let ttl = self.ttl;
        let retry = self.retry;
        let id = id.clone();
        let cache_key = key.clone();

        self.meta_flights
            .run(&key, async move {
                let mut object = retry.run("get", || store.get(&id)).await?;
                let parent = if object.parents.is_empty() {
                    None
                } else {
                    Some(object.parents.swap_remove(0))
                };
                let meta = ObjectMeta {
                    entry: normalize(object),
                    parent,
                };
                write_through(cache.as_deref(), &cache_key, &meta, ttl).await;
                Ok(meta)
            })
            .await
    }

    /// Read at most `limit` bytes of a small object. Not cached.
    pub async fn read_small(&self, id: &ObjectId, limit: usize) -> Result<Bytes> {
        self.retry
            .run("read", || async {
                let content = self.store.get_content(id, None).await?;
                let mut body = content.body;
                let mut buf = BytesMut::new();
                while let Some(chunk) = body.next().await {
                    let chunk = chunk?;
                    let room = limit - buf.len();
                    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                    if buf.len() >= limit {
                        break;
                    }
                }
                Ok(buf.freeze())
            })
            .await
    }
}

async fn write_through<T: Serialize>(
    cache: Option<&dyn CacheStore>,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    let Some(cache) = cache else {
        return;
    };
    match serde_json::to_value(value) {
        Ok(json) => cache.set(key, json, ttl).await,
        Err(e) => tracing::warn!(key, error = %e, "Failed to encode cache entry"),
    }
}
