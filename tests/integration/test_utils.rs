//! Test utilities for integration tests.
//!
//! Builds an axum app around a router with a manual clock and a shared memory
//! backend, and provides request/response helpers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use cookie::Cookie;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use waypoint::routing::Router;
use waypoint::server::{create_app, AppState, RouterConfig};
use waypoint::session::{ManualClock, MemoryBackend, SessionManager, SessionOptions};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) TestBrowser/1.0";
pub const HOST: &str = "example.test";
pub const T0: u64 = 1_700_000_000;

// =============================================================================
// Test App
// =============================================================================

pub struct TestApp {
    pub app: axum::Router,
    pub clock: Arc<ManualClock>,
    pub backend: Arc<MemoryBackend>,
}

impl TestApp {
    pub fn new(router: Router) -> Self {
        Self::build(router, SessionOptions::with_timeout(3600), "")
    }

    pub fn with_options(router: Router, options: SessionOptions) -> Self {
        Self::build(router, options, "")
    }

    pub fn with_base(router: Router, base: &str) -> Self {
        Self::build(router, SessionOptions::with_timeout(3600), base)
    }

    fn build(router: Router, options: SessionOptions, base: &str) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let backend = Arc::new(MemoryBackend::with_capacity(64));
        let sessions = SessionManager::new("test-app", SECRET)
            .with_backend(backend.clone())
            .with_clock(clock.clone())
            .with_options(options);

        let state = AppState::new(router, sessions).with_base_url(base);
        let app = create_app(state, RouterConfig::default().with_tracing(false));
        Self {
            app,
            clock,
            backend,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// GET `uri` as the default browser, optionally with a session cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request("GET", uri, BROWSER, cookie)).await
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

pub fn request(method: &str, uri: &str, user_agent: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, HOST)
        .header(header::USER_AGENT, user_agent);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

// =============================================================================
// Response Helpers
// =============================================================================

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// The session cookie set by a response.
pub fn set_cookie(response: &Response<Body>) -> Cookie<'static> {
    let value = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response sets the session cookie")
        .to_str()
        .unwrap()
        .to_string();
    Cookie::parse(value).unwrap()
}

/// The `Cookie` request header value replaying a response's session cookie.
pub fn cookie_header(response: &Response<Body>) -> String {
    let cookie = set_cookie(response);
    format!("{}={}", cookie.name(), cookie.value())
}
