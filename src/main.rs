//! waypoint - pattern routing and sessions over HTTP.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypoint::{
    app::build_router,
    config::Config,
    server::{create_app, AppState, RouterConfig},
    session::{MemoryBackend, SessionManager},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("waypoint v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Base path: {}", display_base(config.base_url()));
    info!("  Public dir: {}", config.public_dir.display());
    if !config.public_dir.is_dir() {
        warn!("  Public dir does not exist; static files will not be served");
    }
    info!("  Session key: {}", config.session_key);
    if config.session_timeout > 0 {
        info!(
            "  Session timeout: {}s ({})",
            config.session_timeout,
            if config.session_rolling { "rolling" } else { "fixed" }
        );
    } else {
        info!("  Session timeout: never");
    }
    info!("  Session capacity: {}", config.session_capacity);
    if let Some(ref path) = config.routes_file {
        info!("  Routes file: {}", path.display());
    }

    // Build the application router
    let router = build_router(&config.public_dir, config.routes_file.as_ref());
    info!("  Routes: {}", router.route_count());
    for pattern in router.patterns() {
        info!("    {}", pattern);
    }

    // Sessions
    let sessions = SessionManager::new(&config.session_key, &config.session_secret)
        .with_backend(Arc::new(MemoryBackend::with_capacity(config.session_capacity)))
        .with_options(config.session_options());

    let state = AppState::new(router, sessions).with_base_url(config.base_url());
    let app = create_app(state, build_router_config(&config));

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    if !config.no_health {
        info!("    curl http://{}/health", addr);
    }
    info!("    curl -c jar -b jar http://{}{}/visits", addr, config.base_url());
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn display_base(base: &str) -> &str {
    if base.is_empty() {
        "/"
    } else {
        base
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "waypoint=debug,tower_http=debug"
    } else {
        "waypoint=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::default();

    // Apply CORS origins
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
        .with_tracing(!config.no_tracing)
        .with_health(!config.no_health)
}
