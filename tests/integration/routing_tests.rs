//! Routing integration tests.
//!
//! Tests verify:
//! - First-match-wins dispatch and verb filtering
//! - Named and wildcard captures over HTTP
//! - Path normalization and query strings
//! - Mounts built in code and loaded from TOML route files
//! - Base path stripping and local redirects
//! - Built-in endpoints and unsupported methods

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, StatusCode};
use serde_json::json;

use tower::ServiceExt;

use waypoint::app::builtin_handlers;
use waypoint::routing::Router;
use waypoint::server::{create_app, AppState, RouterConfig};
use waypoint::session::SessionManager;

use super::test_utils::{body_json, body_string, request, TestApp, BROWSER, SECRET};

fn echo_router() -> Router {
    Router::new()
        .get("/users/:id", |ctx, params| {
            let body = json!({
                "id": params.named("id"),
                "positional": params.positional(),
            });
            ctx.reply().send_json(&body);
        })
        .get("/files/*", |ctx, params| {
            let body = json!({ "path": params.get(0) });
            ctx.reply().send_json(&body);
        })
        .get("/search", |ctx, _| {
            let q = ctx.query_param("q").unwrap_or_default();
            ctx.reply().send_text(q);
        })
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_only_first_matching_route_fires() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (a, b) = (first.clone(), second.clone());

    let router = Router::new()
        .get("/items/:id", move |ctx, _| {
            a.fetch_add(1, Ordering::SeqCst);
            ctx.reply().send_text("first");
        })
        .on("/items/*", move |ctx, _| {
            b.fetch_add(1, Ordering::SeqCst);
            ctx.reply().send_text("second");
        });
    let app = TestApp::new(router);

    let response = app.get("/items/7", None).await;
    assert_eq!(body_string(response).await, "first");
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);

    // POST skips the GET route and reaches the any-verb route
    let response = app.send(request("POST", "/items/7", BROWSER, None)).await;
    assert_eq!(body_string(response).await, "second");
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_named_capture() {
    let app = TestApp::new(echo_router());

    let response = app.get("/users/42", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "id": "42", "positional": ["42"] })
    );
}

#[tokio::test]
async fn test_named_capture_needs_a_token() {
    let app = TestApp::new(echo_router());

    // Normalizes to "/users", which nothing handles: empty 200
    let response = app.get("/users/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_wildcard_crosses_separators() {
    let app = TestApp::new(echo_router());

    let response = app.get("/files/a/b/c.txt", None).await;
    assert_eq!(body_json(response).await, json!({ "path": "a/b/c.txt" }));
}

#[tokio::test]
async fn test_path_is_normalized() {
    let app = TestApp::new(echo_router());

    let response = app.get("//users///9/?verbose=1", None).await;
    assert_eq!(body_json(response).await["id"], "9");
}

#[tokio::test]
async fn test_query_parameters() {
    let app = TestApp::new(echo_router());

    let response = app.get("/search?q=hello%20world&page=2", None).await;
    assert_eq!(body_string(response).await, "hello world");
}

#[tokio::test]
async fn test_unmatched_request_is_empty_ok() {
    let app = TestApp::new(echo_router());

    let response = app.get("/nowhere", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.is_empty());
}

// =============================================================================
// Mounts
// =============================================================================

#[tokio::test]
async fn test_nested_mounts() {
    let router = Router::new().mount("/api", |api| {
        api.mount("/v1", |v1| {
            v1.get("/status", |ctx, _| {
                ctx.reply().send_text("v1 ok");
            })
        })
    });
    let app = TestApp::new(router);

    assert_eq!(body_string(app.get("/api/v1/status", None).await).await, "v1 ok");
    assert!(body_string(app.get("/v1/status", None).await).await.is_empty());
}

#[tokio::test]
async fn test_mount_route_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.toml");
    std::fs::write(
        &path,
        r#"
[[route]]
verbs = ["GET"]
pattern = "/ping"
handler = "ping"

[[route]]
pattern = "/echo/:name/*"
handler = "echo"
"#,
    )
    .unwrap();

    let router = Router::new().mount_file("/ext", &path, &builtin_handlers());
    let app = TestApp::new(router);

    assert_eq!(body_string(app.get("/ext/ping", None).await).await, "pong");

    let response = app
        .send(request("DELETE", "/ext/echo/ada/x/y", BROWSER, None))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["named"], json!({ "name": "ada" }));
    assert_eq!(body["positional"], json!(["ada", "x/y"]));
    assert_eq!(body["path"], "/ext/echo/ada/x/y");
}

#[tokio::test]
async fn test_broken_route_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.toml");
    std::fs::write(
        &path,
        "[[route]]\npattern = \"/x\"\nhandler = \"no_such_handler\"\n",
    )
    .unwrap();

    let router = Router::new()
        .mount_file("/ext", &path, &builtin_handlers())
        .get("/ext/x", |ctx, _| {
            ctx.reply().send_text("fallback");
        });
    let app = TestApp::new(router);

    assert_eq!(body_string(app.get("/ext/x", None).await).await, "fallback");
}

// =============================================================================
// Base Path
// =============================================================================

#[tokio::test]
async fn test_base_path_is_stripped() {
    let app = TestApp::with_base(echo_router(), "/app");

    let response = app.get("/app/users/5", None).await;
    assert_eq!(body_json(response).await["id"], "5");

    // The session cookie is scoped to the base path
    let response = app.get("/app/users/5", None).await;
    assert!(response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Path=/app"));
}

#[tokio::test]
async fn test_local_redirect_keeps_base_path() {
    let router = Router::new()
        .get("/old", |ctx, _| ctx.redirect("/new", true, true))
        .get("/away", |ctx, _| {
            ctx.redirect("https://elsewhere.test/", false, false)
        });
    let app = TestApp::with_base(router, "/app");

    let response = app.get("/app/old", None).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/app/new");

    let response = app.get("/app/away", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "https://elsewhere.test/");
}

// =============================================================================
// Built-in Endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(Router::new());

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_disabled_health_goes_to_router() {
    let router = Router::new().get("/health", |ctx, _| {
        ctx.reply().send_text("app health");
    });
    let sessions = SessionManager::new("test-app", SECRET);
    let config = RouterConfig::default().with_tracing(false).with_health(false);
    let app = create_app(AppState::new(router, sessions), config);

    let response = app
        .oneshot(request("GET", "/health", BROWSER, None))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "app health");
}

#[tokio::test]
async fn test_unsupported_method() {
    let app = TestApp::new(echo_router());

    let response = app.send(request("TRACE", "/users/1", BROWSER, None)).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"], "method_not_allowed");
}
