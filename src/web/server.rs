//! HTTP server for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::{Gateway, GatewayError, Result};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::{create_health_router, create_router};

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Unlock rate limiting.
    rate_limit: Arc<RateLimitState>,
    /// CORS allowed origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, gateway: Arc<Gateway>) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid server address: {e}")))?;

        let app_state = AppState::new(
            gateway,
            Duration::from_millis(config.security.unlock_min_latency_ms),
        );

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            rate_limit: Arc::new(RateLimitState::new(config.security.unlock_rate_limit)),
            cors_origins: config.server.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The complete application router.
    pub fn router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            self.rate_limit.clone(),
            &self.cors_origins,
        )
        .merge(create_health_router())
    }

    async fn bind(&self) -> std::io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        self.rate_limit.clone().start_cleanup_task();
        tracing::info!("Gateway listening on http://{}", local_addr);
        Ok((listener, local_addr))
    }

    /// Start the server.
    pub async fn run(self) -> std::io::Result<()> {
        let router = self.router();
        let (listener, _) = self.bind().await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let router = self.router();
        let (listener, local_addr) = self.bind().await?;

        tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCache};
    use crate::store::MemoryStore;

    fn create_test_config(store: &MemoryStore) -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0; // Use random port
        config.upstream.root_id = store.root().to_string();
        config.security.identifier_secret = "server-identifier-secret".to_string();
        config.security.token_secret = "server-token-secret-value".to_string();
        config
    }

    fn create_gateway(config: &Config, store: Arc<MemoryStore>) -> Arc<Gateway> {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        Arc::new(Gateway::from_config(config, store, Some(cache)).unwrap())
    }

    #[test]
    fn test_web_server_new() {
        let store = Arc::new(MemoryStore::new());
        let config = create_test_config(&store);
        let server = WebServer::new(&config, create_gateway(&config, store)).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_web_server_rejects_bad_address() {
        let store = Arc::new(MemoryStore::new());
        let mut config = create_test_config(&store);
        let gateway = create_gateway(&config, store);
        config.server.host = "not an address".to_string();
        assert!(matches!(
            WebServer::new(&config, gateway),
            Err(GatewayError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let store = Arc::new(MemoryStore::new());
        store.add_file(&store.root(), "hello.txt", "hello");
        let config = create_test_config(&store);
        let server = WebServer::new(&config, create_gateway(&config, store)).unwrap();
        let addr = server.run_with_addr().await.unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "OK");

        let resp = client
            .get(format!("http://{}/resolve", addr))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["entries"][0]["name"], "hello.txt");
    }
}
