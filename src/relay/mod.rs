//! Push-to-pull streaming of remote content.
//!
//! A spawned pump task reads the upstream body and feeds a bounded channel;
//! the HTTP body pulls from the other end. The channel bound is the only
//! buffering, so a slow client slows the upstream read. The pump stops and
//! drops the upstream body as soon as the client goes away, the upstream
//! stalls past the idle timeout, or the window is complete.

pub mod range;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::config::{RangeFallback, RelayConfig};
use crate::model::ObjectId;
use crate::retry::RetryPolicy;
use crate::store::{ByteRange, ByteStream, RemoteStore};
use crate::{GatewayError, Result};

pub use range::{parse_range_header, RangeRequest};

/// Pull side of a relayed body.
pub struct RelayStream {
    rx: mpsc::Receiver<Result<Bytes>>,
}

impl Stream for RelayStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// An opened relay plus what the response headers need.
pub struct RelayedBody {
    /// Body chunks.
    pub stream: RelayStream,
    /// Inclusive byte window when a range is being served.
    pub window: Option<(u64, u64)>,
    /// Size of the whole object.
    pub total_size: u64,
    /// Bytes the body will carry, when known.
    pub content_length: Option<u64>,
}

/// Opens upstream content and relays it through a bounded queue.
pub struct StreamingRelay {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    queue_depth: usize,
    idle_timeout: Duration,
    fallback: RangeFallback,
}

impl StreamingRelay {
    pub fn new(store: Arc<dyn RemoteStore>, retry: RetryPolicy, config: &RelayConfig) -> Self {
        Self {
            store,
            retry,
            queue_depth: config.queue_depth.max(1),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            fallback: config.range_fallback,
        }
    }

    /// Open `id` (of `size` bytes), optionally restricted to `range`.
    ///
    /// Only opening the upstream body is retried; once bytes flow, failures
    /// end the stream with an error item.
    pub async fn open(
        &self,
        id: &ObjectId,
        size: u64,
        range: Option<RangeRequest>,
    ) -> Result<RelayedBody> {
        let window = range.map(|r| r.resolve(size)).transpose()?;
        let upstream_range = window.map(|(start, end)| ByteRange {
            start,
            end: Some(end),
        });

        let content = self
            .retry
            .run("content", || self.store.get_content(id, upstream_range))
            .await?;
        let total_size = content.total_size.unwrap_or(size);

        let (skip, take) = match window {
            None => (0, content.total_size),
            Some((start, end)) if content.range_honored => (0, Some(end - start + 1)),
            Some((start, end)) => match self.fallback {
                RangeFallback::Reject => {
                    tracing::debug!(object = %id, "Upstream ignored range; rejecting");
                    // Dropping `content` releases the upstream connection.
                    drop(content);
                    return Err(GatewayError::RangeNotSupported);
                }
                RangeFallback::Slice => {
                    tracing::debug!(object = %id, start, end, "Upstream ignored range; slicing");
                    (start, Some(end - start + 1))
                }
            },
        };

        let (tx, rx) = mpsc::channel(self.queue_depth);
        tokio::spawn(pump(content.body, tx, skip, take, self.idle_timeout));

        Ok(RelayedBody {
            stream: RelayStream { rx },
            window,
            total_size,
            content_length: take,
        })
    }
}

/// Copy `upstream` into `tx`, dropping the first `skip` bytes and stopping
/// after `take` bytes.
async fn pump(
    mut upstream: ByteStream,
    tx: mpsc::Sender<Result<Bytes>>,
    mut skip: u64,
    mut remaining: Option<u64>,
    idle_timeout: Duration,
) {
    loop {
        if remaining == Some(0) {
            return;
        }

        let next = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("Client went away; releasing upstream body");
                return;
            }
            next = tokio::time::timeout(idle_timeout, upstream.next()) => next,
        };

        let mut chunk = match next {
            Err(_) => {
                tracing::warn!("Upstream body stalled");
                let _ = tx
                    .send(Err(GatewayError::UpstreamTimeout("content body".to_string())))
                    .await;
                return;
            }
            Ok(None) => {
                if remaining.is_some_and(|r| r > 0) {
                    tracing::warn!("Upstream body ended early");
                    let _ = tx
                        .send(Err(GatewayError::UpstreamUnavailable(
                            "upstream body truncated".to_string(),
                        )))
                        .await;
                }
                return;
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(error = %e, "Upstream body failed");
                let _ = tx.send(Err(e)).await;
                return;
            }
            Ok(Some(Ok(chunk))) => chunk,
        };

        if skip > 0 {
            let n = skip.min(chunk.len() as u64);
            chunk = chunk.slice(n as usize..);
            skip -= n;
        }
        if let Some(left) = remaining.as_mut() {
            if chunk.len() as u64 > *left {
                chunk.truncate(*left as usize);
            }
            *left -= chunk.len() as u64;
        }
        if chunk.is_empty() {
            continue;
        }
        if tx.send(Ok(chunk)).await.is_err() {
            return;
        }
    }
}
