//! Rate limiting for password attempts.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, RwLock},
    time::Duration,
};

use crate::web::error::ApiError;

/// Per-IP rate limiter using Governor.
pub type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// State for rate limiting.
#[derive(Clone)]
pub struct RateLimitState {
    /// Per-IP rate limiters for the unlock endpoint.
    unlock_limiters: Arc<RwLock<HashMap<String, Arc<IpRateLimiter>>>>,
    /// Unlock attempts per minute.
    unlock_rate_limit: u32,
}

impl RateLimitState {
    /// Create a new rate limit state.
    pub fn new(unlock_rate_limit: u32) -> Self {
        Self {
            unlock_limiters: Arc::new(RwLock::new(HashMap::new())),
            unlock_rate_limit,
        }
    }

    fn get_or_create_limiter(&self, ip: &str) -> Arc<IpRateLimiter> {
        {
            let read_guard = self.unlock_limiters.read().unwrap();
            if let Some(limiter) = read_guard.get(ip) {
                return limiter.clone();
            }
        }

        let mut write_guard = self.unlock_limiters.write().unwrap();

        // Double-check after acquiring write lock
        if let Some(limiter) = write_guard.get(ip) {
            return limiter.clone();
        }

        let quota =
            Quota::per_minute(NonZeroU32::new(self.unlock_rate_limit).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        write_guard.insert(ip.to_string(), limiter.clone());
        limiter
    }

    /// Check if an unlock attempt is allowed for the given client.
    pub fn check_unlock(&self, ip: &str) -> bool {
        self.get_or_create_limiter(ip).check().is_ok()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.unlock_limiters.read().unwrap().len()
    }

    /// Drop limiters of idle clients that are not currently throttled.
    pub fn cleanup(&self) {
        let mut guard = self.unlock_limiters.write().unwrap();
        let before = guard.len();
        guard.retain(|_, limiter| {
            Arc::strong_count(limiter) > 1 || limiter.check().is_err()
        });
        let removed = before - guard.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned idle unlock rate limiters");
        }
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            interval.tick().await;
            loop {
                interval.tick().await;
                self.cleanup();
            }
        });
    }
}

/// Extract client IP from request.
pub fn get_client_ip(req: &Request<Body>) -> String {
    // Reverse proxy headers first; take the first hop
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = req
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return real_ip.trim().to_string();
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for the unlock endpoint.
pub async fn unlock_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = get_client_ip(&req);

    if !state.check_unlock(&ip) {
        tracing::warn!(ip = %ip, "Unlock rate limit exceeded");
        return ApiError::rate_limited().into_response();
    }

    next.run(req).await
}
