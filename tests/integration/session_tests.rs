//! Session integration tests.
//!
//! Tests verify:
//! - Session state persists across requests through the signed cookie
//! - Expired sessions are recreated empty
//! - A cookie replayed by another client gets an isolated session while the
//!   owner's record stays intact
//! - Forged cookies are discarded
//! - Destroying a session removes its record and expires the cookie
//! - Namespaces sharing a backend never see each other's data

use std::path::Path;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use serde_json::json;

use waypoint::app::build_router;
use waypoint::routing::Router;
use waypoint::server::{create_app, AppState, RouterConfig};
use waypoint::session::{MemoryBackend, SessionManager, SessionOptions};

use super::test_utils::{
    body_json, cookie_header, request, set_cookie, TestApp, BROWSER, SECRET, T0,
};

fn demo_app() -> TestApp {
    TestApp::new(build_router(Path::new("/nonexistent-public"), None))
}

#[tokio::test]
async fn test_visits_persist_across_requests() {
    let app = demo_app();

    let response = app.get("/visits", None).await;
    let cookie = cookie_header(&response);
    assert_eq!(body_json(response).await, json!({ "visits": 1 }));

    for expected in 2..=4 {
        let response = app.get("/visits", Some(&cookie)).await;
        assert_eq!(body_json(response).await["visits"], expected);
    }

    assert_eq!(app.backend.len(), 1);
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let app = demo_app();

    let response = app.get("/visits", None).await;
    let cookie = set_cookie(&response);
    assert_eq!(cookie.name(), "waypoint_sid");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.max_age().map(|d| d.whole_seconds()), Some(3600));
    assert!(cookie.value().contains('.'));
}

#[tokio::test]
async fn test_expired_session_is_recreated() {
    let router = build_router(Path::new("/nonexistent-public"), None);
    let app = TestApp::with_options(router, SessionOptions::with_timeout(1));

    let response = app.get("/visits", None).await;
    let cookie = cookie_header(&response);
    let response = app.get("/session", Some(&cookie)).await;
    let before = body_json(response).await;
    assert_eq!(before["start"], T0);
    assert_eq!(before["end"], T0 + 1);

    app.clock.advance(5);

    // Same cookie, but the record expired: fresh session, counter restarts
    let response = app.get("/visits", Some(&cookie)).await;
    assert_eq!(body_json(response).await["visits"], 1);

    let response = app.get("/session", Some(&cookie)).await;
    let after = body_json(response).await;
    assert_eq!(after["start"], T0 + 5);
    assert_ne!(after["start"], before["start"]);
}

#[tokio::test]
async fn test_fixed_expiry_is_not_extended() {
    let router = build_router(Path::new("/nonexistent-public"), None);
    let app = TestApp::with_options(router, SessionOptions::with_timeout(10).rolling(false));

    let response = app.get("/visits", None).await;
    let cookie = cookie_header(&response);

    app.clock.advance(6);
    let response = app.get("/session", Some(&cookie)).await;
    assert_eq!(body_json(response).await["end"], T0 + 10);

    app.clock.advance(6);
    let response = app.get("/visits", Some(&cookie)).await;
    assert_eq!(body_json(response).await["visits"], 1);
}

#[tokio::test]
async fn test_replayed_cookie_is_isolated() {
    let app = demo_app();

    let response = app.get("/visits", None).await;
    let cookie = cookie_header(&response);
    let response = app.get("/visits", Some(&cookie)).await;
    assert_eq!(body_json(response).await["visits"], 2);

    // Another client presents the stolen cookie
    let stolen = request("GET", "/visits", "curl/8.5.0", Some(&cookie));
    let response = app.send(stolen).await;
    assert_eq!(body_json(response).await["visits"], 1);

    let stolen = request("GET", "/session", "curl/8.5.0", Some(&cookie));
    let response = app.send(stolen).await;
    assert_eq!(body_json(response).await["linked"], false);

    // A logout from the other client does not touch the owner's record
    let stolen = request("POST", "/logout", "curl/8.5.0", Some(&cookie));
    app.send(stolen).await;

    let response = app.get("/visits", Some(&cookie)).await;
    assert_eq!(body_json(response).await["visits"], 3);
}

#[tokio::test]
async fn test_forged_cookie_starts_new_session() {
    let app = demo_app();

    let response = app.get("/visits", None).await;
    let real = set_cookie(&response);
    app.get("/visits", Some(&cookie_header(&response))).await;

    // Keep the signature, swap the id
    let (_, signature) = real.value().rsplit_once('.').unwrap();
    let forged = format!("waypoint_sid=someone-else.{}", signature);

    let response = app.get("/visits", Some(&forged)).await;
    let reissued = set_cookie(&response);
    assert_ne!(reissued.value(), real.value());
    assert_eq!(body_json(response).await["visits"], 1);
}

#[tokio::test]
async fn test_logout_destroys_session() {
    let app = demo_app();

    let response = app.get("/visits", None).await;
    let cookie = cookie_header(&response);
    assert_eq!(app.backend.len(), 1);

    let response = app
        .send(request("POST", "/logout", BROWSER, Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let removal = set_cookie(&response);
    assert_eq!(removal.max_age().map(|d| d.whole_seconds()), Some(0));
    assert!(app.backend.is_empty());

    let response = app.get("/visits", Some(&cookie)).await;
    assert_eq!(body_json(response).await["visits"], 1);
}

#[tokio::test]
async fn test_set_timeout_endpoint() {
    let app = demo_app();

    let response = app.get("/visits", None).await;
    let cookie = cookie_header(&response);

    let response = app
        .send(request("POST", "/session/timeout/-30", BROWSER, Some(&cookie)))
        .await;
    // Negative clamps to never-expire, which the cookie mirrors
    assert!(set_cookie(&response).max_age().is_none());
    let body = body_json(response).await;
    assert_eq!(body["timeout"], 0);
    assert_eq!(body["end"], 0);

    let response = app
        .send(request("POST", "/session/timeout/abc", BROWSER, Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_namespaces_share_backend_without_colliding() {
    let backend = Arc::new(MemoryBackend::new());

    let counter = |key: &'static str| {
        let router = Router::new().get("/count", move |ctx, _| {
            let session = ctx.session();
            let n = session.get(["n"]).and_then(|v| v.as_u64()).unwrap_or(0) + 1;
            session.set(["n"], n);
            ctx.reply().send_json(&json!({ "key": key, "n": n }));
        });
        let sessions = SessionManager::new(key, SECRET).with_backend(backend.clone());
        create_app(
            AppState::new(router, sessions),
            RouterConfig::default().with_tracing(false),
        )
    };

    let first = TestApp {
        app: counter("first"),
        clock: Arc::new(waypoint::session::ManualClock::new(T0)),
        backend: backend.clone(),
    };
    let second = TestApp {
        app: counter("second"),
        clock: Arc::new(waypoint::session::ManualClock::new(T0)),
        backend: backend.clone(),
    };

    let response = first.get("/count", None).await;
    let cookie = cookie_header(&response);
    first.get("/count", Some(&cookie)).await;

    // Same signing secret, same client id, different namespace
    let response = second.get("/count", Some(&cookie)).await;
    assert_eq!(body_json(response).await, json!({ "key": "second", "n": 1 }));

    let response = first.get("/count", Some(&cookie)).await;
    assert_eq!(body_json(response).await["n"], 3);
    assert_eq!(backend.len(), 2);
}
