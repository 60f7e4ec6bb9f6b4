//! Namespaced, expiring, fingerprint-checked sessions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   SessionManager                     │
//! │  cookie ──verify──▶ SessionId ──┐                    │
//! │  user-agent + host ─▶ fingerprint                    │
//! │                                 ▼                    │
//! │                          SessionStore::init          │
//! └─────────────────────────────────┬────────────────────┘
//!                                   │ load / store / remove
//!                                   ▼
//!                        Arc<dyn SessionBackend>
//!                          (MemoryBackend: LRU)
//! ```
//!
//! One [`SessionStore`] is opened per request and handed to the router through
//! the request [`Context`](crate::context::Context). The backend is shared by
//! every request in the process.

mod backend;
mod clock;
mod signing;
mod store;

use std::sync::Arc;

use cookie::{Cookie, SameSite};
use tracing::debug;

use crate::context::RequestFacts;

pub use backend::{MemoryBackend, SessionBackend, SessionId, SessionRecord, DEFAULT_SESSION_CAPACITY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use signing::{fingerprints_match, SessionSigner};
pub use store::{InitOutcome, KeyPath, SessionOptions, SessionStore};

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "waypoint_sid";

/// Opens per-request sessions and renders their cookies.
#[derive(Clone)]
pub struct SessionManager {
    key: String,
    signer: SessionSigner,
    backend: Arc<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
    cookie_name: String,
}

impl SessionManager {
    /// A manager for namespace `key`, signing with `secret`.
    ///
    /// Uses a default-sized [`MemoryBackend`] and the system clock.
    pub fn new(key: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.into(),
            signer: SessionSigner::new(secret),
            backend: Arc::new(MemoryBackend::new()),
            clock: Arc::new(SystemClock),
            options: SessionOptions::default(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }

    /// Use another backend.
    pub fn with_backend(mut self, backend: Arc<dyn SessionBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Use another clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Options applied to every opened session.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Rename the session cookie.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// The session cookie name.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The namespace key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The signer used for cookies and fingerprints.
    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    /// Open and initialize the session for a request.
    ///
    /// `cookie` is the raw session cookie value, if the client sent one. A
    /// missing or badly signed cookie gets a fresh id.
    pub fn open(&self, cookie: Option<&str>, facts: &RequestFacts) -> SessionStore {
        let id = match cookie.map(|value| self.signer.verify(value)) {
            Some(Ok(id)) => id,
            Some(Err(e)) => {
                debug!("Discarding session cookie: {}", e);
                SessionId::generate()
            }
            None => SessionId::generate(),
        };

        let fingerprint = self.signer.fingerprint(&facts.user_agent, &facts.host);
        let mut store = SessionStore::new(
            self.key.clone(),
            id,
            fingerprint,
            self.backend.clone(),
            self.clock.clone(),
        );
        store.init(&self.options);
        store
    }

    /// Find this manager's cookie in a `Cookie` request header.
    pub fn find_cookie(&self, header: &str) -> Option<String> {
        Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|c| c.name() == self.cookie_name)
            .map(|c| c.value().to_string())
    }

    /// The `Set-Cookie` value carrying `store`'s id.
    ///
    /// A destroyed session yields an expiring removal cookie. A zero cookie
    /// lifetime yields a browser-session cookie without `Max-Age`.
    pub fn cookie(&self, store: &SessionStore, path: &str) -> Cookie<'static> {
        let path = if path.is_empty() { "/" } else { path };
        let mut cookie = Cookie::build((self.cookie_name.clone(), self.signer.cookie_value(store.id())))
            .path(path.to_string())
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

        if store.is_destroyed() {
            cookie.make_removal();
        } else if store.cookie_lifetime() > 0 {
            let seconds = i64::try_from(store.cookie_lifetime()).unwrap_or(i64::MAX);
            cookie.set_max_age(cookie::time::Duration::seconds(seconds));
        }
        cookie
    }
}
