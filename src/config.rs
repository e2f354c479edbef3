//! Configuration module for drivegate.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{GatewayError, Result};

/// Minimum length of the configured secrets, in bytes.
pub const MIN_SECRET_LENGTH: usize = 16;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Remote object store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the drive REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every upstream request.
    #[serde(default)]
    pub access_token: String,
    /// Real identifier of the folder exposed as `/`.
    ///
    /// Must be the concrete id, not an alias, because ancestry checks compare
    /// against the parent ids the store reports.
    #[serde(default)]
    pub root_id: String,
    /// Per-call timeout for listing and metadata requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// TCP connect timeout, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Extra attempts for idempotent reads after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial backoff between attempts, in milliseconds (doubled each retry).
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    200
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: String::new(),
            root_id: String::new(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl UpstreamConfig {
    /// Per-call timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Initial retry backoff as a duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Argon2id cost parameters for folder password digests.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HasherConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Time cost (iterations).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Parallelism (lanes).
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    65536 // 64 MB
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// Identifier, token and password settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Secret the identifier cipher keys are derived from.
    #[serde(default)]
    pub identifier_secret: String,
    /// Secret the access token signing and sealing keys are derived from.
    #[serde(default)]
    pub token_secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    /// Name of the hidden object holding a folder's password.
    #[serde(default = "default_password_marker")]
    pub password_marker: String,
    /// Minimum wall time of an unlock attempt, in milliseconds.
    #[serde(default = "default_unlock_min_latency")]
    pub unlock_min_latency_ms: u64,
    /// Unlock attempts allowed per client IP per minute.
    #[serde(default = "default_unlock_rate_limit")]
    pub unlock_rate_limit: u32,
    /// Password hashing cost.
    #[serde(default)]
    pub hasher: HasherConfig,
}

fn default_token_ttl() -> u64 {
    3600 // 1 hour
}

fn default_password_marker() -> String {
    ".password".to_string()
}

fn default_unlock_min_latency() -> u64 {
    500
}

fn default_unlock_rate_limit() -> u32 {
    10
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            identifier_secret: String::new(),
            token_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
            password_marker: default_password_marker(),
            unlock_min_latency_ms: default_unlock_min_latency(),
            unlock_rate_limit: default_unlock_rate_limit(),
            hasher: HasherConfig::default(),
        }
    }
}

/// Directory cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Whether listings and metadata are cached at all.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Entry lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    120
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// What the relay does when the upstream ignores a range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RangeFallback {
    /// Fail with `RangeNotSupported`.
    #[default]
    Reject,
    /// Cut the requested window out of the full body.
    Slice,
}

/// Streaming relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Chunks buffered between upstream and client.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Longest wait for the next upstream chunk, in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Behaviour when a range cannot be fetched natively.
    #[serde(default)]
    pub range_fallback: RangeFallback,
}

fn default_queue_depth() -> usize {
    4
}

fn default_idle_timeout() -> u64 {
    30
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            idle_timeout_secs: default_idle_timeout(),
            range_fallback: RangeFallback::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/drivegate.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote store configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Security configuration.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GatewayError::Config(format!("config parse error: {e}")))
    }

    /// Secrets are usually injected by the environment rather than the file.
    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            ("DRIVEGATE_IDENTIFIER_SECRET", &mut self.security.identifier_secret),
            ("DRIVEGATE_TOKEN_SECRET", &mut self.security.token_secret),
            ("DRIVEGATE_UPSTREAM_TOKEN", &mut self.upstream.access_token),
        ];
        for (name, slot) in overrides {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    *slot = value;
                }
            }
        }
    }

    /// Validate the configuration before the gateway is built from it.
    pub fn validate(&self) -> Result<()> {
        if self.security.identifier_secret.len() < MIN_SECRET_LENGTH {
            return Err(GatewayError::Config(format!(
                "security.identifier_secret must be at least {MIN_SECRET_LENGTH} bytes \
                 (set it in the config file or via DRIVEGATE_IDENTIFIER_SECRET)"
            )));
        }
        if self.security.token_secret.len() < MIN_SECRET_LENGTH {
            return Err(GatewayError::Config(format!(
                "security.token_secret must be at least {MIN_SECRET_LENGTH} bytes \
                 (set it in the config file or via DRIVEGATE_TOKEN_SECRET)"
            )));
        }
        if self.security.identifier_secret == self.security.token_secret {
            return Err(GatewayError::Config(
                "security.identifier_secret and security.token_secret must differ".to_string(),
            ));
        }
        if self.upstream.root_id.is_empty() {
            return Err(GatewayError::Config("upstream.root_id is not set".to_string()));
        }
        if self.security.password_marker.is_empty() {
            return Err(GatewayError::Config(
                "security.password_marker must not be empty".to_string(),
            ));
        }
        if self.security.token_ttl_secs == 0 {
            return Err(GatewayError::Config(
                "security.token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.cache.enabled && !(1..=3600).contains(&self.cache.ttl_secs) {
            return Err(GatewayError::Config(
                "cache.ttl_secs must be between 1 and 3600".to_string(),
            ));
        }
        if self.relay.queue_depth == 0 {
            return Err(GatewayError::Config(
                "relay.queue_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
