//! API handlers.

pub mod resolve;
pub mod stream;
pub mod unlock;

pub use resolve::resolve;
pub use stream::stream;
pub use unlock::unlock;

use std::sync::Arc;
use std::time::Duration;

use crate::Gateway;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The gateway behind every route.
    pub gateway: Arc<Gateway>,
    /// Minimum wall time of an unlock attempt.
    pub unlock_min_latency: Duration,
}

impl AppState {
    /// Create a new application state.
    pub fn new(gateway: Arc<Gateway>, unlock_min_latency: Duration) -> Self {
        Self {
            gateway,
            unlock_min_latency,
        }
    }
}
