//! Web API Stream Tests
//!
//! Integration tests for `GET /stream/{token}`.

mod common;

use axum::http::{header, StatusCode};
use common::{create_test_server, create_test_server_with, report_content, REPORT_SIZE};
use drivegate::config::RangeFallback;
use serde_json::Value;

fn header_str(response: &axum_test::TestResponse, name: header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

// ============================================================================
// Whole files
// ============================================================================

#[tokio::test]
async fn test_stream_public_file() {
    let gw = create_test_server();
    let token = gw.file_token("welcome.txt", &[]).await;

    let response = gw.server.get(&format!("/stream/{}", token)).await;
    response.assert_status_ok();
    assert_eq!(response.text(), "hello world");
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "11");
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), "bytes");
    assert!(header_str(&response, header::CONTENT_TYPE).starts_with("text/plain"));
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        "inline; filename=\"welcome.txt\""
    );
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    assert!(response.headers().get(header::LAST_MODIFIED).is_some());
    assert_eq!(header_str(&response, header::CACHE_CONTROL), "private, no-cache");
}

#[tokio::test]
async fn test_stream_protected_file_with_token() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;
    let token = gw.file_token("docs/secret/report.pdf", &[&access]).await;

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("x-access-token", access.clone())
        .await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), report_content().as_slice());
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "application/pdf");
    assert_eq!(
        header_str(&response, header::CONTENT_LENGTH),
        REPORT_SIZE.to_string()
    );
}

#[tokio::test]
async fn test_stream_token_in_query_string() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;
    let token = gw.file_token("docs/secret/report.pdf", &[&access]).await;

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_query_param("token", &access)
        .await;
    response.assert_status_ok();
}

// ============================================================================
// Ranges
// ============================================================================

#[tokio::test]
async fn test_stream_bounded_range() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;
    let token = gw.file_token("docs/secret/report.pdf", &[&access]).await;

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("x-access-token", access.clone())
        .add_header("range", "bytes=100-199")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.as_bytes().len(), 100);
    assert_eq!(response.as_bytes().as_ref(), &report_content()[100..200]);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 100-199/1000"
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "100");
}

#[tokio::test]
async fn test_stream_open_and_suffix_ranges() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;
    let token = gw.file_token("docs/secret/report.pdf", &[&access]).await;
    let content = report_content();

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("x-access-token", access.clone())
        .add_header("range", "bytes=990-")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.as_bytes().as_ref(), &content[990..]);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes 990-999/1000");

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("x-access-token", access.clone())
        .add_header("range", "bytes=-100")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.as_bytes().as_ref(), &content[900..]);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes 900-999/1000");

    // End past the object is clamped
    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("x-access-token", access.clone())
        .add_header("range", "bytes=950-5000")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.as_bytes().len(), 50);
}

#[tokio::test]
async fn test_stream_unsatisfiable_range() {
    let gw = create_test_server();
    let token = gw.file_token("welcome.txt", &[]).await;

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("range", "bytes=11-")
        .await;
    response.assert_status(StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes */11");
    let body: Value = response.json();
    assert_eq!(body["error"], "range_not_satisfiable");
}

#[tokio::test]
async fn test_stream_malformed_range() {
    let gw = create_test_server();
    let token = gw.file_token("welcome.txt", &[]).await;

    for range in ["items=0-1", "bytes=5-2", "bytes=0-1,3-4"] {
        let response = gw
            .server
            .get(&format!("/stream/{}", token))
            .add_header("range", range)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_stream_range_without_upstream_support_is_rejected() {
    let gw = create_test_server();
    gw.store.set_supports_ranges(false);
    let token = gw.file_token("welcome.txt", &[]).await;

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("range", "bytes=0-4")
        .await;
    response.assert_status(StatusCode::RANGE_NOT_SATISFIABLE);
    let body: Value = response.json();
    assert_eq!(body["error"], "range_not_supported");

    // Whole-file requests still work
    let response = gw.server.get(&format!("/stream/{}", token)).await;
    response.assert_status_ok();
    assert_eq!(response.text(), "hello world");
}

#[tokio::test]
async fn test_stream_range_sliced_when_configured() {
    let gw = create_test_server_with(|config| config.relay.range_fallback = RangeFallback::Slice);
    gw.store.set_supports_ranges(false);
    gw.store.set_chunk_size(3);
    let token = gw.file_token("welcome.txt", &[]).await;

    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("range", "bytes=6-10")
        .await;
    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.text(), "world");
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes 6-10/11");
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_stream_without_token_is_forbidden() {
    let gw = create_test_server();
    let token = gw.seal(&gw.tree.report);

    let response = gw.server.get(&format!("/stream/{}", token)).await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "access_denied");
}

#[tokio::test]
async fn test_stream_checks_every_ancestor() {
    let gw = create_test_server();
    let token = gw.seal(&gw.tree.deep);

    gw.server
        .get(&format!("/stream/{}", token))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let access = gw.unlock_secret().await;
    let response = gw
        .server
        .get(&format!("/stream/{}", token))
        .add_header("authorization", format!("Bearer {}", access))
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "deep content");
}

#[tokio::test]
async fn test_stream_token_for_other_folder_is_forbidden() {
    let gw = create_test_server();
    let vault = gw.store.add_folder(&gw.store.root(), "vault");
    gw.store.add_file(&vault, ".password", "vault-pass");

    let vault_token = gw.challenge_token("vault").await;
    let response = gw.unlock(&vault_token, "vault-pass").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let vault_access = body["data"]["access_token"].as_str().unwrap().to_string();

    let response = gw
        .server
        .get(&format!("/stream/{}", gw.seal(&gw.tree.report)))
        .add_header("x-access-token", vault_access)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

// ============================================================================
// Not found
// ============================================================================

#[tokio::test]
async fn test_stream_undecryptable_token_is_not_found() {
    let gw = create_test_server();

    for token in ["garbage", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "%00"] {
        let response = gw.server.get(&format!("/stream/{}", token)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_stream_missing_object_looks_like_bad_token() {
    let gw = create_test_server();
    let missing = gw.seal(&drivegate::ObjectId::new("deleted-object"));

    let tampered = gw.server.get("/stream/garbage").await;
    let absent = gw.server.get(&format!("/stream/{}", missing)).await;

    absent.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(absent.text(), tampered.text());
}

#[tokio::test]
async fn test_stream_refuses_folders_and_markers() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;

    for id in [&gw.tree.docs, &gw.tree.marker] {
        let response = gw
            .server
            .get(&format!("/stream/{}", gw.seal(id)))
            .add_header("x-access-token", access.clone())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_stream_outside_root_is_not_found() {
    let gw = create_test_server();
    let orphan = gw
        .store
        .add_file(&drivegate::ObjectId::new("elsewhere"), "loose.txt", "x");

    let response = gw
        .server
        .get(&format!("/stream/{}", gw.seal(&orphan)))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Upstream failures
// ============================================================================

#[tokio::test]
async fn test_stream_upstream_failure_is_bad_gateway() {
    let gw = create_test_server();
    let token = gw.seal(&gw.tree.welcome);
    gw.store.fail_next(10);

    let response = gw.server.get(&format!("/stream/{}", token)).await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"], "upstream_unavailable");
}

#[tokio::test]
async fn test_stream_transient_failure_is_retried() {
    let gw = create_test_server();
    let token = gw.seal(&gw.tree.welcome);
    gw.store.fail_next(1);

    let response = gw.server.get(&format!("/stream/{}", token)).await;
    response.assert_status_ok();
    assert_eq!(response.text(), "hello world");
}
