use std::sync::Arc;

use tracing::info;

use drivegate::cache::{CacheStore, MemoryCache};
use drivegate::{Config, DriveStore, Gateway, WebServer};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

async fn serve(config: Config) -> drivegate::Result<()> {
    let store = Arc::new(DriveStore::new(&config.upstream)?);
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let gateway = Arc::new(Gateway::from_config(&config, store, Some(cache))?);

    let server = WebServer::new(&config, gateway)?;
    server.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let config = match Config::load_with_env(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    if let Err(e) = drivegate::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        drivegate::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    info!("drivegate - Secure Path & Streaming Gateway");
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    if let Err(e) = serve(config).await {
        tracing::error!("Gateway stopped: {e}");
        std::process::exit(1);
    }
}
