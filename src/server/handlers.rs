//! HTTP request handlers.
//!
//! Every request that is not a built-in endpoint goes through
//! [`dispatch_handler`]:
//!
//! ```text
//! request ─▶ RequestFacts (verb, target, user-agent, host)
//!         ─▶ SessionManager::open (cookie, fingerprint)
//!         ─▶ Router::dispatch (Context: path, session, reply)
//!         ─▶ Reply ─▶ response + Set-Cookie
//! ```
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - everything else - the application router

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::{Context, RequestFacts};
use crate::error::ServeError;
use crate::routing::{DispatchOutcome, Router, Verb};
use crate::session::{InitOutcome, SessionManager};

use super::files::reply_into_response;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The application's route table
    pub router: Arc<Router>,

    /// Opens per-request sessions
    pub sessions: Arc<SessionManager>,

    /// Path prefix the application is served under ("" for the root)
    pub base_url: Arc<str>,
}

impl AppState {
    /// Create application state served at the root.
    pub fn new(router: Router, sessions: SessionManager) -> Self {
        Self {
            router: Arc::new(router),
            sessions: Arc::new(sessions),
            base_url: Arc::from(""),
        }
    }

    /// Serve the application under `base_url`.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Arc::from(base_url.trim_end_matches('/'));
        self
    }

    /// Path the session cookie is scoped to.
    pub fn cookie_path(&self) -> &str {
        if self.base_url.is_empty() {
            "/"
        } else {
            &self.base_url
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "method_not_allowed")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Conversion
// =============================================================================

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ServeError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServeError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            ServeError::MethodNotAllowed(_) => {
                (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed")
            }
        };

        let message = match &self {
            // Do not leak filesystem paths
            ServeError::NotFound(_) => "The requested file does not exist".to_string(),
            ServeError::Io { .. } => "The requested file could not be read".to_string(),
            ServeError::MethodNotAllowed(_) => self.to_string(),
        };

        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Route a request through the application router.
///
/// The session is opened before dispatch and its cookie is attached to
/// whatever the handler replied. A request nothing matched gets an empty
/// `200`.
pub async fn dispatch_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();

    let verb = match Verb::try_from(&parts.method) {
        Ok(verb) => verb,
        Err(_) => {
            return ServeError::MethodNotAllowed(parts.method.to_string()).into_response();
        }
    };

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let host = header_text(&parts.headers, header::HOST)
        .or_else(|| parts.uri.host().map(str::to_string))
        .unwrap_or_default();
    let user_agent = header_text(&parts.headers, header::USER_AGENT).unwrap_or_default();
    let facts = RequestFacts::new(verb, target).with_client(user_agent, host);

    let cookie = parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| state.sessions.find_cookie(value));

    let mut session = state.sessions.open(cookie.as_deref(), &facts);
    if session.outcome() == Some(InitOutcome::HijackSuspected) {
        warn!(path = %parts.uri.path(), "Serving request with an isolated session");
    }

    let reply = {
        let mut ctx = Context::new(facts, &state.base_url, &mut session);
        let outcome = state.router.dispatch(&mut ctx).await;
        if outcome == DispatchOutcome::NoMatch {
            debug!(verb = %verb, path = ctx.path(), "No route matched");
        }
        ctx.into_reply()
    };

    let mut response = reply_into_response(reply, &parts.method, &parts.headers).await;

    let cookie = state.sessions.cookie(&session, state.cookie_path());
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!("Dropping unencodable session cookie: {}", e),
    }

    response
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
