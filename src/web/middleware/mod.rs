//! Middleware and extractors for the gateway API.

pub mod access;
pub mod cors;
pub mod rate_limit;
pub mod security;

pub use access::AccessTokens;
pub use cors::create_cors_layer;
pub use rate_limit::{get_client_ip, unlock_rate_limit, RateLimitState};
pub use security::security_headers;
