//! Axum application assembly.
//!
//! # Route Structure
//!
//! ```text
//! /health    - Health check
//! /*         - Application router (fallback)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use waypoint::routing::Router;
//! use waypoint::server::{create_app, AppState, RouterConfig};
//! use waypoint::session::SessionManager;
//!
//! let router = Router::new().get("/", |ctx, _| {
//!     ctx.reply().send_text("hello");
//! });
//! let sessions = SessionManager::new("my-app", "a-long-random-server-secret-value");
//!
//! let app = create_app(AppState::new(router, sessions), RouterConfig::default());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{HeaderValue, CONTENT_TYPE, COOKIE};
use http::Method;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{dispatch_handler, health_handler, AppState};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP layer.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Whether to answer `GET /health` ahead of the application router
    pub enable_health: bool,
}

impl Default for RouterConfig {
    /// By default:
    /// - CORS allows any origin
    /// - Tracing is enabled
    /// - The health endpoint is enabled
    fn default() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            enable_health: true,
        }
    }
}

impl RouterConfig {
    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Enable or disable the health endpoint.
    pub fn with_health(mut self, enabled: bool) -> Self {
        self.enable_health = enabled;
        self
    }
}

// =============================================================================
// App Builder
// =============================================================================

/// Create the axum application.
///
/// All requests except the health check fall through to the application
/// router held in `state`.
pub fn create_app(state: AppState, config: RouterConfig) -> Router {
    let cors = build_cors_layer(&config);

    let mut app = Router::new();
    if config.enable_health {
        app = app.route("/health", get(health_handler));
    }
    let app = app
        .fallback(dispatch_handler)
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

/// Build the CORS layer based on configuration.
///
/// Credentials are allowed for explicit origins so the session cookie
/// travels with cross-origin requests.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, COOKIE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(AllowOrigin::any()),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed).allow_credentials(true)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
