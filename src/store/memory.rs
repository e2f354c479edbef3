//! In-memory remote store.
//!
//! Holds a small folder tree in memory and implements [`RemoteStore`] with
//! the same paging, range and error behaviour as a real drive. Call counters
//! and fault injection make it the stub upstream for tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;

use super::{ByteRange, RemoteContent, RemoteObject, RemotePage, RemoteStore};
use crate::model::ObjectId;
use crate::{GatewayError, Result};

/// MIME type the memory store reports for folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const NO_LIMIT: usize = usize::MAX;

struct Node {
    object: RemoteObject,
    children: Vec<ObjectId>,
    content: Bytes,
}

/// Decrements the open-stream counter when a body is dropped.
struct StreamGuard(Arc<AtomicUsize>);

impl StreamGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Folder tree kept in memory.
pub struct MemoryStore {
    root: ObjectId,
    nodes: RwLock<HashMap<ObjectId, Node>>,
    next_id: AtomicUsize,
    page_size: AtomicUsize,
    chunk_size: AtomicUsize,
    supports_ranges: AtomicBool,
    latency_ms: AtomicU64,
    failures_left: AtomicUsize,
    stall_after: AtomicUsize,
    fail_after: AtomicUsize,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    content_calls: AtomicUsize,
    open_streams: Arc<AtomicUsize>,
    last_fields: RwLock<Vec<String>>,
}

impl MemoryStore {
    /// Create a store holding only an empty root folder.
    pub fn new() -> Self {
        let root = ObjectId::new("mem-root");
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            Node {
                object: folder_object(root.clone(), "My Drive", vec![]),
                children: vec![],
                content: Bytes::new(),
            },
        );

        Self {
            root,
            nodes: RwLock::new(nodes),
            next_id: AtomicUsize::new(1),
            page_size: AtomicUsize::new(100),
            chunk_size: AtomicUsize::new(64 * 1024),
            supports_ranges: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            failures_left: AtomicUsize::new(0),
            stall_after: AtomicUsize::new(NO_LIMIT),
            fail_after: AtomicUsize::new(NO_LIMIT),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            content_calls: AtomicUsize::new(0),
            open_streams: Arc::new(AtomicUsize::new(0)),
            last_fields: RwLock::new(vec![]),
        }
    }

    /// Identifier of the root folder.
    pub fn root(&self) -> ObjectId {
        self.root.clone()
    }

    fn allocate_id(&self) -> ObjectId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        ObjectId::new(format!("mem-{n:04}"))
    }

    fn insert(&self, parent: &ObjectId, object: RemoteObject, content: Bytes) -> ObjectId {
        let id = object.id.clone();
        let mut nodes = self.nodes.write().unwrap();
        if let Some(parent_node) = nodes.get_mut(parent) {
            parent_node.children.push(id.clone());
        }
        nodes.insert(
            id.clone(),
            Node {
                object,
                children: vec![],
                content,
            },
        );
        id
    }

    /// Add a folder under `parent`.
    pub fn add_folder(&self, parent: &ObjectId, name: &str) -> ObjectId {
        let id = self.allocate_id();
        let object = folder_object(id, name, vec![parent.clone()]);
        self.insert(parent, object, Bytes::new())
    }

    /// Add a file under `parent`; the MIME type is guessed from the name.
    pub fn add_file(&self, parent: &ObjectId, name: &str, content: impl Into<Bytes>) -> ObjectId {
        let content = content.into();
        let id = self.allocate_id();
        let object = RemoteObject {
            id,
            name: name.to_string(),
            mime_type: Some(
                mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
            ),
            size: Some(content.len() as u64),
            modified_time: Some(Utc::now()),
            is_folder: false,
            file_extension: None,
            media: None,
            parents: vec![parent.clone()],
        };
        self.insert(parent, object, content)
    }

    /// Replace a file's content and bump its modification time.
    pub fn set_content(&self, id: &ObjectId, content: impl Into<Bytes>) {
        let content = content.into();
        let mut nodes = self.nodes.write().unwrap();
        if let Some(node) = nodes.get_mut(id) {
            node.object.size = Some(content.len() as u64);
            node.object.modified_time = Some(Utc::now() + chrono::Duration::milliseconds(1));
            node.content = content;
        }
    }

    /// Detach an object from its parent.
    pub fn remove(&self, id: &ObjectId) {
        let mut nodes = self.nodes.write().unwrap();
        if let Some(node) = nodes.remove(id) {
            for parent in &node.object.parents {
                if let Some(parent_node) = nodes.get_mut(parent) {
                    parent_node.children.retain(|child| child != id);
                }
            }
        }
    }

    /// Children per listing page.
    pub fn set_page_size(&self, size: usize) {
        self.page_size.store(size.max(1), Ordering::SeqCst);
    }

    /// Bytes per body chunk.
    pub fn set_chunk_size(&self, size: usize) {
        self.chunk_size.store(size.max(1), Ordering::SeqCst);
    }

    /// Whether `get_content` honours ranges.
    pub fn set_supports_ranges(&self, supported: bool) {
        self.supports_ranges.store(supported, Ordering::SeqCst);
    }

    /// Artificial delay before every `list` and `get` answer.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fail the next `n` `list`/`get` calls with `UpstreamUnavailable`.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Bodies stop producing (without ending) after `chunks` chunks.
    pub fn stall_bodies_after(&self, chunks: usize) {
        self.stall_after.store(chunks, Ordering::SeqCst);
    }

    /// Bodies yield an error after `chunks` chunks.
    pub fn fail_bodies_after(&self, chunks: usize) {
        self.fail_after.store(chunks, Ordering::SeqCst);
    }

    /// Number of `list` calls served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get` calls served.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_content` calls served.
    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    /// Bodies handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Fields requested by the most recent `list` call.
    pub fn last_fields(&self) -> Vec<String> {
        self.last_fields.read().unwrap().clone()
    }

    async fn simulate_call(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(GatewayError::UpstreamUnavailable(
                "injected failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn folder_object(id: ObjectId, name: &str, parents: Vec<ObjectId>) -> RemoteObject {
    RemoteObject {
        id,
        name: name.to_string(),
        mime_type: Some(FOLDER_MIME.to_string()),
        size: None,
        modified_time: Some(Utc::now()),
        is_folder: true,
        file_extension: None,
        media: None,
        parents,
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(
        &self,
        folder: &ObjectId,
        fields: &[&str],
        page_token: Option<&str>,
    ) -> Result<RemotePage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fields.write().unwrap() = fields.iter().map(|f| f.to_string()).collect();
        self.simulate_call().await?;

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| GatewayError::UpstreamUnavailable("bad page token".to_string()))?,
            None => 0,
        };

        let nodes = self.nodes.read().unwrap();
        let node = nodes
            .get(folder)
            .filter(|n| n.object.is_folder)
            .ok_or_else(|| GatewayError::NotFound("folder".to_string()))?;

        let page_size = self.page_size.load(Ordering::SeqCst);
        let items: Vec<RemoteObject> = node
            .children
            .iter()
            .skip(offset)
            .take(page_size)
            .filter_map(|child| nodes.get(child))
            .map(|child| RemoteObject {
                parents: vec![],
                ..child.object.clone()
            })
            .collect();

        let next = offset + page_size;
        let next_page_token = (next < node.children.len()).then(|| next.to_string());

        Ok(RemotePage {
            items,
            next_page_token,
        })
    }

    async fn get(&self, id: &ObjectId) -> Result<RemoteObject> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;

        let nodes = self.nodes.read().unwrap();
        nodes
            .get(id)
            .map(|n| n.object.clone())
            .ok_or_else(|| GatewayError::NotFound("object".to_string()))
    }

    async fn get_content(&self, id: &ObjectId, range: Option<ByteRange>) -> Result<RemoteContent> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);

        let content = {
            let nodes = self.nodes.read().unwrap();
            let node = nodes
                .get(id)
                .filter(|n| !n.object.is_folder)
                .ok_or_else(|| GatewayError::NotFound("object".to_string()))?;
            node.content.clone()
        };
        let total = content.len() as u64;

        let (body, range_honored) = match range {
            Some(range) if self.supports_ranges.load(Ordering::SeqCst) => {
                if range.start >= total {
                    return Err(GatewayError::RangeNotSatisfiable { size: total });
                }
                let end = range.end.unwrap_or(total - 1).min(total - 1);
                (content.slice(range.start as usize..=end as usize), true)
            }
            _ => (content, false),
        };

        let chunk_size = self.chunk_size.load(Ordering::SeqCst);
        let chunks: Vec<Bytes> = (0..body.len())
            .step_by(chunk_size)
            .map(|start| body.slice(start..(start + chunk_size).min(body.len())))
            .collect();

        let stall_after = self.stall_after.load(Ordering::SeqCst);
        let fail_after = self.fail_after.load(Ordering::SeqCst);
        let guard = StreamGuard::new(self.open_streams.clone());

        let body = stream::unfold(
            (chunks.into_iter(), 0usize, guard),
            move |(mut chunks, sent, guard)| async move {
                if sent >= stall_after {
                    futures::future::pending::<()>().await;
                }
                if sent >= fail_after {
                    let err = GatewayError::UpstreamUnavailable("connection reset".to_string());
                    return Some((Err(err), (Vec::new().into_iter(), sent, guard)));
                }
                let chunk = chunks.next()?;
                Some((Ok(chunk), (chunks, sent + 1, guard)))
            },
        );

        Ok(RemoteContent {
            body: Box::pin(body),
            range_honored,
            total_size: Some(total),
        })
    }
}
