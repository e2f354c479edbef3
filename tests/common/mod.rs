//! Shared fixture for the HTTP API tests.
//!
//! Builds an in-memory drive shaped like:
//!
//! ```text
//! /
//! ├── welcome.txt
//! └── docs/
//!     ├── readme.md
//!     └── secret/          (password "hunter2")
//!         ├── .password
//!         ├── report.pdf   (1000 bytes)
//!         └── inner/
//!             └── deep.txt
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use drivegate::cache::{CacheStore, MemoryCache};
use drivegate::config::HasherConfig;
use drivegate::{Config, Gateway, MemoryStore, ObjectId, WebServer};
use serde_json::{json, Value};

/// Password of the protected folder.
pub const SECRET_PASSWORD: &str = "hunter2";

/// Size of `report.pdf`.
pub const REPORT_SIZE: usize = 1000;

/// Byte `i` of `report.pdf`.
pub fn report_byte(i: usize) -> u8 {
    (i % 251) as u8
}

/// Content of `report.pdf`.
pub fn report_content() -> Vec<u8> {
    (0..REPORT_SIZE).map(report_byte).collect()
}

/// Identifiers of the fixture tree.
pub struct Tree {
    pub docs: ObjectId,
    pub secret: ObjectId,
    pub marker: ObjectId,
    pub inner: ObjectId,
    pub welcome: ObjectId,
    pub readme: ObjectId,
    pub report: ObjectId,
    pub deep: ObjectId,
}

/// A running test server with its backing store.
pub struct TestGateway {
    pub server: TestServer,
    pub store: Arc<MemoryStore>,
    pub tree: Tree,
    pub config: Config,
}

/// Configuration with cheap hashing and no unlock padding.
pub fn create_test_config(store: &MemoryStore) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.upstream.root_id = store.root().to_string();
    config.upstream.retry_backoff_ms = 1;
    config.security.identifier_secret = "test-identifier-secret-value".to_string();
    config.security.token_secret = "test-token-secret-value-xyz".to_string();
    config.security.unlock_min_latency_ms = 0;
    config.security.unlock_rate_limit = 1000;
    config.security.hasher = HasherConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };
    config
}

/// Populate the fixture tree.
pub fn build_tree(store: &MemoryStore) -> Tree {
    let root = store.root();
    let welcome = store.add_file(&root, "welcome.txt", "hello world");
    let docs = store.add_folder(&root, "docs");
    let readme = store.add_file(&docs, "readme.md", "# Docs");
    let secret = store.add_folder(&docs, "secret");
    let marker = store.add_file(&secret, ".password", format!("{SECRET_PASSWORD}\n"));
    let report = store.add_file(&secret, "report.pdf", report_content());
    let inner = store.add_folder(&secret, "inner");
    let deep = store.add_file(&inner, "deep.txt", "deep content");

    Tree {
        docs,
        secret,
        marker,
        inner,
        welcome,
        readme,
        report,
        deep,
    }
}

/// Create a test server with the default fixture.
pub fn create_test_server() -> TestGateway {
    create_test_server_with(|_| {})
}

/// Create a test server, adjusting the configuration first.
pub fn create_test_server_with(adjust: impl FnOnce(&mut Config)) -> TestGateway {
    let store = Arc::new(MemoryStore::new());
    let tree = build_tree(&store);
    let mut config = create_test_config(&store);
    adjust(&mut config);

    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let gateway = Gateway::from_config(&config, store.clone(), Some(cache))
        .expect("Failed to build gateway");
    let web = WebServer::new(&config, Arc::new(gateway)).expect("Failed to build server");
    let server = TestServer::new(web.router()).expect("Failed to create test server");

    TestGateway {
        server,
        store,
        tree,
        config,
    }
}

impl TestGateway {
    /// `GET /resolve` for a path, with optional access tokens.
    pub async fn resolve(&self, path: &str, tokens: &[&str]) -> axum_test::TestResponse {
        let mut request = self.server.get("/resolve").add_query_param("path", path);
        if !tokens.is_empty() {
            request = request.add_header("x-access-token", tokens.join(","));
        }
        request.await
    }

    /// Resolve a path to its challenge and return the folder token.
    pub async fn challenge_token(&self, path: &str) -> String {
        let response = self.resolve(path, &[]).await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        body["protected_path_token"]
            .as_str()
            .expect("challenge without token")
            .to_string()
    }

    /// Seal an identifier the way the server under test does.
    pub fn seal(&self, id: &ObjectId) -> String {
        let gateway = Gateway::from_config(&self.config, self.store.clone(), None)
            .expect("Failed to build gateway");
        gateway.seal_id(id).expect("Failed to seal identifier")
    }

    /// `POST /unlock`.
    pub async fn unlock(&self, folder_token: &str, password: &str) -> axum_test::TestResponse {
        self.server
            .post("/unlock")
            .json(&json!({
                "protected_path_token": folder_token,
                "password": password,
            }))
            .await
    }

    /// Unlock `docs/secret` and return the access token.
    pub async fn unlock_secret(&self) -> String {
        let folder_token = self.challenge_token("docs/secret").await;
        let response = self.unlock(&folder_token, SECRET_PASSWORD).await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    /// Stream token of the file at `path`, resolved with `tokens`.
    pub async fn file_token(&self, path: &str, tokens: &[&str]) -> String {
        let response = self.resolve(path, tokens).await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["data"]["file"]["file_token"]
            .as_str()
            .expect("not a file")
            .to_string()
    }
}
