//! # waypoint
//!
//! A pattern-matching HTTP router with mountable sub-routers, static asset
//! bindings and namespaced, expiring, fingerprint-checked sessions.
//!
//! ## Features
//!
//! - **Pattern routes**: literal text, `:name` captures and greedy `*`
//!   wildcards, first match wins
//! - **Mounts**: sub-routers built in code or loaded from TOML route tables
//! - **Static bindings**: serve files by extension or by path prefix
//! - **Sessions**: namespaced key/value trees with rolling or fixed expiry,
//!   bound to the client through an HMAC fingerprint
//!
//! ## Architecture
//!
//! - [`routing`] - Patterns, routes, routers and route tables
//! - [`session`] - Session store, backends, cookie signing
//! - [`context`] - Per-request context and reply
//! - [`server`] - Axum integration
//! - [`app`] - The application served by the binary
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use waypoint::context::{Context, RequestFacts};
//! use waypoint::routing::{Router, Verb};
//! use waypoint::session::{MemoryBackend, SessionId, SessionStore, SystemClock};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let router = Router::new().get("/users/:id", |ctx, params| {
//!     let id = params.named("id").unwrap_or_default().to_string();
//!     ctx.session().set(["last_user"], id.clone());
//!     ctx.reply().send_text(id);
//! });
//!
//! let mut session = SessionStore::new(
//!     "my-app",
//!     SessionId::generate(),
//!     "fingerprint",
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(SystemClock),
//! );
//! let mut ctx = Context::new(RequestFacts::new(Verb::Get, "/users/42"), "", &mut session);
//!
//! assert!(router.dispatch(&mut ctx).await.is_match());
//! drop(ctx);
//! assert_eq!(session.get(["last_user"]), Some(&"42".into()));
//! # }
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod routing;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use context::{Context, Reply, ReplyBody, RequestFacts};
pub use error::{ConfigError, MountError, PatternError, ServeError, SessionError};
pub use routing::{
    normalize, DispatchOutcome, HandlerRegistry, Matcher, Params, Pattern, Route, RouteDef,
    Router, Verb, VerbSet,
};
pub use server::{create_app, AppState, ErrorResponse, RouterConfig};
pub use session::{
    Clock, InitOutcome, KeyPath, ManualClock, MemoryBackend, SessionBackend, SessionId,
    SessionManager, SessionOptions, SessionRecord, SessionSigner, SessionStore, SystemClock,
};
