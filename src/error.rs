use thiserror::Error;

/// Errors raised while parsing a route pattern.
///
/// These never escape route registration: a rejected pattern compiles to a
/// matcher that matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Two captures in one pattern share a name
    #[error("Duplicate capture name ':{name}' in pattern '{pattern}'")]
    DuplicateCapture { pattern: String, name: String },
}

/// Errors that make a mount target unusable.
///
/// The router logs these and skips the mount; remaining registrations carry on.
#[derive(Debug, Clone, Error)]
pub enum MountError {
    /// A route table names a handler that was never registered
    #[error("Unknown handler '{0}'")]
    UnknownHandler(String),

    /// A route table names a verb outside the supported set
    #[error("Unknown HTTP verb '{0}'")]
    UnknownVerb(String),

    /// The route file could not be read
    #[error("Cannot read route file {path}: {message}")]
    Unreadable { path: String, message: String },

    /// The route file is not a valid route table
    #[error("Invalid route file {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Errors from the session persistence layer.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The backend failed to read or write a record
    #[error("Session backend error: {0}")]
    Backend(String),

    /// A lock guarding shared session state was poisoned by a panicking holder
    #[error("Session storage lock poisoned")]
    Poisoned,

    /// The session cookie is not `<id>.<signature>`
    #[error("Malformed session cookie")]
    MalformedCookie,

    /// The session cookie signature does not verify
    #[error("Invalid session cookie signature")]
    InvalidSignature,
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The session namespace key is empty
    #[error("session_key must not be empty. Set --session-key or WAYPOINT_SESSION_KEY")]
    EmptySessionKey,

    /// The session secret is too short to sign anything meaningfully
    #[error("session_secret must be at least {min} bytes (got {actual})")]
    WeakSecret { min: usize, actual: usize },

    /// The session backend needs room for at least one session
    #[error("session_capacity must be greater than 0")]
    ZeroCapacity,

    /// The base path must be absolute
    #[error("base_path must start with '/' (got '{0}')")]
    RelativeBasePath(String),
}

/// Errors answered directly by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServeError {
    /// A file handed to the file sender does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// A file exists but could not be read
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },

    /// The request method is not one the router understands
    #[error("Method {0} is not supported")]
    MethodNotAllowed(String),
}
