//! HTTP surface of the gateway.
//!
//! Three routes: `GET /resolve` walks a virtual path, `POST /unlock` trades
//! a folder password for an access token, and `GET /stream/{token}` relays
//! file content.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
