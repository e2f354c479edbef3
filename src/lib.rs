//! drivegate - Secure Path & Streaming Gateway
//!
//! Exposes a folder tree of a remote object store as a public, read-only
//! virtual filesystem. Real object identifiers never leave the gateway,
//! folders can be password protected, and file content is relayed with
//! byte-range support.

pub mod auth;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod lister;
pub mod logging;
pub mod model;
pub mod path;
pub mod relay;
pub mod retry;
pub mod store;
pub mod web;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use model::{DirectoryEntry, ObjectId};
pub use store::{DriveStore, MemoryStore, RemoteStore};
pub use web::WebServer;
