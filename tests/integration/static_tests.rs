//! Static file integration tests.
//!
//! Tests verify:
//! - Extension and entry-prefix bindings serve files with the right MIME type
//! - Missing files fall through to routes, or answer 404 when configured to
//! - Forced content types
//! - Parent-directory segments never escape the folder
//! - Handlers sending files directly
//! - Range and HEAD requests against static files

use std::path::Path;

use axum::http::{header, HeaderValue, StatusCode};
use tempfile::TempDir;

use waypoint::routing::Router;

use super::test_utils::{body_json, body_string, request, TestApp, BROWSER};

fn public_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("css")).unwrap();
    std::fs::create_dir_all(root.join("docs")).unwrap();
    std::fs::write(root.join("css/site.css"), "body { margin: 0 }").unwrap();
    std::fs::write(root.join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    std::fs::write(root.join("docs/readme.txt"), "read me").unwrap();
    std::fs::write(root.join("docs/data.bin"), "raw").unwrap();
    dir
}

fn fallback_router(folder: &Path) -> Router {
    Router::new()
        .by_ext(["css", "png"], folder, None, false)
        .by_entry("/docs", folder.join("docs"), None, true)
        .by_entry("/raw", folder.join("docs"), Some("text/plain"), false)
        .on("/*", |ctx, _| {
            ctx.reply().send_text("route");
        })
}

#[tokio::test]
async fn test_serves_by_extension() {
    let dir = public_dir();
    let app = TestApp::new(fallback_router(dir.path()));

    let response = app.get("/css/site.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    assert_eq!(body_string(response).await, "body { margin: 0 }");

    let response = app.get("/logo.png", None).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_missing_extension_file_falls_through() {
    let dir = public_dir();
    let app = TestApp::new(fallback_router(dir.path()));

    let response = app.get("/css/missing.css", None).await;
    assert_eq!(body_string(response).await, "route");
}

#[tokio::test]
async fn test_entry_prefix_with_not_found() {
    let dir = public_dir();
    let app = TestApp::new(fallback_router(dir.path()));

    let response = app.get("/docs/readme.txt", None).await;
    assert_eq!(body_string(response).await, "read me");

    let response = app.get("/docs/missing.txt", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_forced_content_type() {
    let dir = public_dir();
    let app = TestApp::new(fallback_router(dir.path()));

    let response = app.get("/raw/data.bin", None).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_string(response).await, "raw");
}

#[tokio::test]
async fn test_static_bindings_only_answer_reads() {
    let dir = public_dir();
    let app = TestApp::new(fallback_router(dir.path()));

    let response = app
        .send(request("POST", "/css/site.css", BROWSER, None))
        .await;
    assert_eq!(body_string(response).await, "route");
}

#[tokio::test]
async fn test_parent_segments_do_not_escape() {
    let dir = public_dir();
    let secret = dir.path().join("secret.txt");
    std::fs::write(&secret, "top secret").unwrap();

    let app = TestApp::new(fallback_router(dir.path()));

    let response = app.get("/docs/../secret.txt", None).await;
    let body = body_string(response).await;
    assert_ne!(body, "top secret");
    assert_eq!(body, "route");
}

#[tokio::test]
async fn test_static_file_range_request() {
    let dir = public_dir();
    let app = TestApp::new(fallback_router(dir.path()));

    let mut range = request("GET", "/docs/readme.txt", BROWSER, None);
    range
        .headers_mut()
        .insert(header::RANGE, HeaderValue::from_static("bytes=0-3"));
    let response = app.send(range).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(body_string(response).await, "read");
}

#[tokio::test]
async fn test_static_file_head_request() {
    let dir = public_dir();
    let app = TestApp::new(fallback_router(dir.path()));

    let response = app
        .send(request("HEAD", "/docs/readme.txt", BROWSER, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "7");
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_handler_sends_file() {
    let dir = public_dir();
    let readme = dir.path().join("docs/readme.txt");

    let router = Router::new().get("/download", move |ctx, _| {
        ctx.reply().send_file(readme.clone(), Some("application/octet-stream"));
    });
    let app = TestApp::new(router);

    let response = app.get("/download", None).await;
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert!(response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(body_string(response).await, "read me");
}
