//! Collapse concurrent identical upstream calls into one.
//!
//! The first caller for a key becomes the leader and its future is shared;
//! callers arriving while it runs await the same result. The slot is freed
//! once the result is in or nobody is waiting any more.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::{GatewayError, Result};

type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Slot<T: Clone> {
    id: u64,
    flight: Flight<T>,
    waiters: usize,
}

/// Per-key in-flight call registry.
pub struct SingleFlight<T: Clone> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

/// Leaves the slot when a waiter finishes or gives up.
struct FlightGuard<'a, T: Clone> {
    slots: &'a Mutex<HashMap<String, Slot<T>>>,
    key: &'a str,
    id: u64,
    finished: bool,
}

impl<T: Clone> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        let Some(slot) = slots.get_mut(self.key).filter(|s| s.id == self.id) else {
            return;
        };
        slot.waiters = slot.waiters.saturating_sub(1);
        // A finished result is never reused; an abandoned call is dropped.
        if self.finished || slot.waiters == 0 {
            slots.remove(self.key);
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` unless an identical call for `key` is already in flight.
    pub async fn run<F>(&self, key: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (id, flight) = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| GatewayError::Internal("single-flight lock poisoned".into()))?;
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                flight: call.boxed().shared(),
                waiters: 0,
            });
            slot.waiters += 1;
            (slot.id, slot.flight.clone())
        };

        let mut guard = FlightGuard {
            slots: &self.slots,
            key,
            id,
            finished: false,
        };
        let result = flight.await;
        guard.finished = true;
        result
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }
}
