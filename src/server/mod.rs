//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────────────┐ │
//! │  │  handlers   │  │      files       │  │       routes        │ │
//! │  │ (dispatch)  │  │ (reply, sending) │  │ (app, CORS, trace)  │ │
//! │  └─────────────┘  └──────────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod files;
pub mod handlers;
pub mod routes;

pub use files::{reply_into_response, send_file};
pub use handlers::{dispatch_handler, health_handler, AppState, ErrorResponse, HealthResponse};
pub use routes::{create_app, RouterConfig};
