//! Web API Resolve Tests
//!
//! Integration tests for `GET /resolve`.

mod common;

use axum::http::StatusCode;
use common::{create_test_server, SECRET_PASSWORD};
use serde_json::Value;

fn names(body: &Value) -> Vec<String> {
    body["data"]["entries"]
        .as_array()
        .expect("entries missing")
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_resolve_root_lists_children() {
    let gw = create_test_server();

    let response = gw.server.get("/resolve").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["kind"], "folder");
    assert_eq!(body["data"]["protection_required"], false);
    assert_eq!(body["data"]["protected"], false);
    assert_eq!(body["data"]["breadcrumb"].as_array().unwrap().len(), 0);

    let mut listed = names(&body);
    listed.sort();
    assert_eq!(listed, vec!["docs", "welcome.txt"]);

    for entry in body["data"]["entries"].as_array().unwrap() {
        let is_folder = entry["is_folder"].as_bool().unwrap();
        assert_eq!(entry["file_token"].is_string(), !is_folder);
        assert!(entry["segment"].as_str().unwrap().contains(':'));
    }
}

#[tokio::test]
async fn test_resolve_never_exposes_real_ids() {
    let gw = create_test_server();

    let root = gw.resolve("", &[]).await.text();
    let docs = gw.resolve("docs", &[]).await.text();

    for text in [root, docs] {
        assert!(!text.contains(gw.tree.docs.as_str()));
        assert!(!text.contains(gw.tree.welcome.as_str()));
        assert!(!text.contains(gw.tree.secret.as_str()));
    }
}

#[tokio::test]
async fn test_resolve_nested_folder_builds_breadcrumb() {
    let gw = create_test_server();

    let response = gw.resolve("/docs/", &[]).await;
    response.assert_status_ok();

    let body: Value = response.json();
    let mut listed = names(&body);
    listed.sort();
    assert_eq!(listed, vec!["readme.md", "secret"]);

    let breadcrumb = body["data"]["breadcrumb"].as_array().unwrap();
    assert_eq!(breadcrumb.len(), 1);
    assert_eq!(breadcrumb[0]["label"], "docs");
}

#[tokio::test]
async fn test_resolve_file_returns_metadata() {
    let gw = create_test_server();

    let response = gw.resolve("docs/readme.md", &[]).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["kind"], "file");
    assert!(body["data"].get("entries").is_none());
    let file = &body["data"]["file"];
    assert_eq!(file["name"], "readme.md");
    assert_eq!(file["size"], 6);
    assert_eq!(file["extension"], "md");
    assert!(file["file_token"].is_string());
}

#[tokio::test]
async fn test_resolve_segment_from_listing_round_trips() {
    let gw = create_test_server();

    let body: Value = gw.resolve("", &[]).await.json();
    let docs_segment = body["data"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == "docs")
        .unwrap()["segment"]
        .as_str()
        .unwrap()
        .to_string();

    let response = gw.resolve(&docs_segment, &[]).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["breadcrumb"][0]["segment"], docs_segment.as_str());
}

#[tokio::test]
async fn test_resolve_fingerprint_disambiguates_duplicate_names() {
    let gw = create_test_server();
    let root = gw.store.root();
    let first = gw.store.add_folder(&root, "dup");
    gw.store.add_file(&first, "one.txt", "1");
    let second = gw.store.add_folder(&root, "dup");
    gw.store.add_file(&second, "two.txt", "2");

    let body: Value = gw.resolve("", &[]).await.json();
    let segments: Vec<String> = body["data"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["name"] == "dup")
        .map(|e| e["segment"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(segments.len(), 2);
    assert_ne!(segments[0], segments[1]);

    let mut seen = Vec::new();
    for segment in &segments {
        let body: Value = gw.resolve(segment, &[]).await.json();
        seen.extend(names(&body));
    }
    seen.sort();
    assert_eq!(seen, vec!["one.txt", "two.txt"]);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_resolve_pages_cover_folder_exactly_once() {
    let gw = create_test_server();
    let root = gw.store.root();
    for i in 0..5 {
        gw.store.add_file(&root, &format!("file-{i}.txt"), "x");
    }
    gw.store.set_page_size(2);

    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    for _ in 0..10 {
        let mut request = gw.server.get("/resolve").add_query_param("path", "");
        if let Some(c) = &cursor {
            request = request.add_query_param("cursor", c);
        }
        let response = request.await;
        response.assert_status_ok();
        let body: Value = response.json();
        collected.extend(names(&body));
        cursor = body["data"]["next_cursor"].as_str().map(str::to_string);
        if cursor.is_none() {
            break;
        }
    }

    assert!(cursor.is_none());
    let mut sorted = collected.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), collected.len(), "duplicate entries across pages");
    assert_eq!(collected.len(), 7);
}

#[tokio::test]
async fn test_resolve_rejects_foreign_cursor() {
    let gw = create_test_server();
    let root = gw.store.root();
    for i in 0..3 {
        gw.store.add_file(&root, &format!("file-{i}.txt"), "x");
    }
    gw.store.set_page_size(1);

    let body: Value = gw.resolve("", &[]).await.json();
    let cursor = body["data"]["next_cursor"].as_str().unwrap().to_string();

    let response = gw
        .server
        .get("/resolve")
        .add_query_param("path", "docs")
        .add_query_param("cursor", &cursor)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "bad_request");
}

// ============================================================================
// Not found
// ============================================================================

#[tokio::test]
async fn test_resolve_missing_segment_reports_index() {
    let gw = create_test_server();

    let response = gw.resolve("docs/missing/file.txt", &[]).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["segment_index"], 2);
}

#[tokio::test]
async fn test_resolve_through_a_file_is_not_found() {
    let gw = create_test_server();

    let response = gw.resolve("welcome.txt/child", &[]).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["segment_index"], 2);
}

// ============================================================================
// Protection
// ============================================================================

#[tokio::test]
async fn test_protected_ancestor_yields_challenge_not_not_found() {
    let gw = create_test_server();

    let response = gw.resolve("docs/secret/report.pdf", &[]).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let text = response.text();
    assert!(!text.contains("report.pdf"));

    let body: Value = response.json();
    assert_eq!(body["error"], "password_required");
    assert_eq!(body["protection_required"], true);
    assert_eq!(body["folder"], "secret");
    assert_eq!(body["segment_index"], 2);
    assert!(body["protected_path_token"].is_string());

    let breadcrumb = body["breadcrumb"].as_array().unwrap();
    assert_eq!(breadcrumb.len(), 2);
    assert_eq!(breadcrumb[1]["label"], "secret");
}

#[tokio::test]
async fn test_unlock_then_resolve_returns_file() {
    let gw = create_test_server();

    let folder_token = gw.challenge_token("docs/secret/report.pdf").await;
    let response = gw.unlock(&folder_token, SECRET_PASSWORD).await;
    response.assert_status_ok();
    let body: Value = response.json();
    let access = body["data"]["access_token"].as_str().unwrap().to_string();

    let response = gw.resolve("docs/secret/report.pdf", &[&access]).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["kind"], "file");
    assert_eq!(body["data"]["protected"], true);
    assert_eq!(body["data"]["file"]["name"], "report.pdf");
    assert_eq!(body["data"]["file"]["size"], 1000);
    assert_eq!(body["data"]["file"]["mime_type"], "application/pdf");
}

#[tokio::test]
async fn test_unlocked_listing_hides_password_marker() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;

    let response = gw.resolve("docs/secret", &[&access]).await;
    response.assert_status_ok();
    let body: Value = response.json();
    let mut listed = names(&body);
    listed.sort();
    assert_eq!(listed, vec!["inner", "report.pdf"]);

    let response = gw.resolve("docs/secret/.password", &[&access]).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unlock_covers_descendants() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;

    let response = gw.resolve("docs/secret/inner/deep.txt", &[&access]).await;
    response.assert_status_ok();

    let response = gw.resolve("docs/secret/inner/deep.txt", &[]).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_accepted_from_any_source() {
    let gw = create_test_server();
    let access = gw.unlock_secret().await;

    let response = gw
        .server
        .get("/resolve")
        .add_query_param("path", "docs/secret")
        .add_header("authorization", format!("Bearer {}", access))
        .await;
    response.assert_status_ok();

    let response = gw
        .server
        .get("/resolve")
        .add_query_param("path", "docs/secret")
        .add_header("cookie", format!("access_token={}", access))
        .await;
    response.assert_status_ok();

    let response = gw
        .server
        .get("/resolve")
        .add_query_param("path", "docs/secret")
        .add_query_param("token", &access)
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_tampered_access_token_still_challenged() {
    let gw = create_test_server();
    let mut access = gw.unlock_secret().await;
    let last = access.pop().unwrap();
    access.push(if last == 'A' { 'B' } else { 'A' });

    let response = gw.resolve("docs/secret", &[&access]).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_one_folder_does_not_open_another() {
    let gw = create_test_server();
    let vault = gw.store.add_folder(&gw.store.root(), "vault");
    gw.store.add_file(&vault, ".password", "different");
    gw.store.add_file(&vault, "gold.txt", "au");

    let access = gw.unlock_secret().await;

    let response = gw.resolve("vault", &[&access]).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["folder"], "vault");
    assert_eq!(body["segment_index"], 1);
}
