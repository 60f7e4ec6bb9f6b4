//! Configuration management for waypoint.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `WAYPOINT_` prefix:
//!
//! - `WAYPOINT_HOST` - Server bind address (default: 0.0.0.0)
//! - `WAYPOINT_PORT` - Server port (default: 3000)
//! - `WAYPOINT_BASE_PATH` - Path prefix the application is served under
//! - `WAYPOINT_PUBLIC_DIR` - Folder static assets are served from (default: public)
//! - `WAYPOINT_SESSION_KEY` - Session namespace key (default: waypoint)
//! - `WAYPOINT_SESSION_SECRET` - HMAC secret for session cookies (required)
//! - `WAYPOINT_SESSION_TIMEOUT` - Session lifetime in seconds, 0 = never (default: 3600)
//! - `WAYPOINT_SESSION_ROLLING` - Extend expiry on every request (default: true)
//! - `WAYPOINT_SESSION_CAPACITY` - Max sessions held in memory (default: 10000)
//! - `WAYPOINT_ROUTES_FILE` - TOML route table to mount at startup
//! - `WAYPOINT_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::error::ConfigError;
use crate::session::{SessionOptions, DEFAULT_SESSION_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default static asset folder.
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Default session namespace key.
pub const DEFAULT_SESSION_KEY: &str = "waypoint";

/// Default session lifetime in seconds (1 hour).
pub const DEFAULT_SESSION_TIMEOUT: i64 = 3600;

/// Shortest accepted session secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

// =============================================================================
// CLI Arguments
// =============================================================================

/// waypoint - pattern routing and sessions over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "waypoint")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "WAYPOINT_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "WAYPOINT_PORT")]
    pub port: u16,

    /// Path prefix the application is served under (e.g. "/app").
    ///
    /// Stripped from request paths before routing.
    #[arg(long, default_value = "", env = "WAYPOINT_BASE_PATH")]
    pub base_path: String,

    /// Folder static assets are served from.
    #[arg(long, default_value = DEFAULT_PUBLIC_DIR, env = "WAYPOINT_PUBLIC_DIR")]
    pub public_dir: PathBuf,

    /// TOML route table mounted at the root.
    #[arg(long, env = "WAYPOINT_ROUTES_FILE")]
    pub routes_file: Option<PathBuf>,

    // =========================================================================
    // Session Configuration
    // =========================================================================
    /// Namespace key separating this application's sessions from others.
    #[arg(long, default_value = DEFAULT_SESSION_KEY, env = "WAYPOINT_SESSION_KEY")]
    pub session_key: String,

    /// Secret used to sign session cookies and client fingerprints.
    #[arg(long, env = "WAYPOINT_SESSION_SECRET")]
    pub session_secret: String,

    /// Session lifetime in seconds. 0 or negative means never expire.
    #[arg(
        long,
        default_value_t = DEFAULT_SESSION_TIMEOUT,
        env = "WAYPOINT_SESSION_TIMEOUT",
        allow_negative_numbers = true
    )]
    pub session_timeout: i64,

    /// Push the session expiry forward on every request.
    #[arg(long, default_value_t = true, env = "WAYPOINT_SESSION_ROLLING", action = ArgAction::Set)]
    pub session_rolling: bool,

    /// Maximum number of sessions held in memory.
    #[arg(long, default_value_t = DEFAULT_SESSION_CAPACITY, env = "WAYPOINT_SESSION_CAPACITY")]
    pub session_capacity: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "WAYPOINT_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    /// Do not answer `GET /health`; the path goes to the router instead.
    #[arg(long, default_value_t = false)]
    pub no_health: bool,
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_key.is_empty() {
            return Err(ConfigError::EmptySessionKey);
        }

        if self.session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual: self.session_secret.len(),
            });
        }

        if self.session_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(ConfigError::RelativeBasePath(self.base_path.clone()));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The base path without a trailing separator ("" for the root).
    pub fn base_url(&self) -> &str {
        self.base_path.trim_end_matches('/')
    }

    /// Options applied to every request's session.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::with_timeout(self.session_timeout).rolling(self.session_rolling)
    }
}

// =============================================================================
// Tests
// =============================================================================
