//! The per-request session store.
//!
//! # Lifecycle
//!
//! ```text
//!  absent ──init──▶ active ──expiry passes──▶ expired ──init──▶ active (recreated)
//!                     │
//!                     └──fingerprint mismatch──▶ isolated (fresh, unlinked)
//! ```
//!
//! A [`SessionStore`] is linked to one backing record while it is active:
//! every mutation is written through to the backend. When the stored
//! fingerprint does not match the current client the store refuses the
//! record, leaves it untouched in the backend, and serves the request from an
//! empty in-memory record that is never persisted. Destroying an isolated
//! store never removes the record it refused, so a spoofed client cannot
//! delete a victim's session.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::backend::{SessionBackend, SessionId, SessionRecord};
use super::clock::Clock;
use super::signing::fingerprints_match;

// =============================================================================
// Key Paths
// =============================================================================

/// A path into the nested session tree.
///
/// The empty path addresses the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// The empty path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from keys.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// Extend this path by one key.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Self(keys)
    }

    /// The keys, outermost first.
    pub fn keys(&self) -> &[String] {
        &self.0
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(keys: [&str; N]) -> Self {
        Self::new(keys)
    }
}

impl From<&[&str]> for KeyPath {
    fn from(keys: &[&str]) -> Self {
        Self::new(keys.iter().copied())
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(keys: Vec<String>) -> Self {
        Self(keys)
    }
}

// =============================================================================
// Options and Outcomes
// =============================================================================

/// Options applied when a session is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Lifetime in seconds. Negative clamps to 0 (never expires). `None`
    /// keeps the store's current timeout.
    pub timeout: Option<i64>,

    /// Push expiry forward on every load.
    pub rolling: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            rolling: true,
        }
    }
}

impl SessionOptions {
    /// Options with a timeout, rolling enabled.
    pub fn with_timeout(timeout: i64) -> Self {
        Self {
            timeout: Some(timeout),
            rolling: true,
        }
    }

    /// Enable or disable rolling expiry.
    pub fn rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }
}

/// What [`SessionStore::init`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// No record existed; a new one was created
    Created,

    /// An existing record was loaded
    Resumed,

    /// The record had expired; it was destroyed and created afresh
    Recreated,

    /// The record belongs to another client; an isolated session is in use
    HijackSuspected,

    /// The backend failed; an isolated session is in use
    Unavailable,
}

impl InitOutcome {
    /// `false` only when the stored fingerprint did not match.
    pub fn succeeded(self) -> bool {
        !matches!(self, InitOutcome::HijackSuspected)
    }
}

// =============================================================================
// Session Store
// =============================================================================

#[derive(Debug, Clone)]
enum State {
    /// `init` has not run yet
    Unloaded,

    /// Bound to the backing record; writes go through
    Linked(SessionRecord),

    /// Private in-memory record, never persisted
    Isolated(SessionRecord),

    /// Dropped by `destroy`
    Destroyed,
}

/// Namespaced, expiring, fingerprint-checked session state for one request.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use waypoint::session::{MemoryBackend, SessionId, SessionOptions, SessionStore, SystemClock};
///
/// let backend = Arc::new(MemoryBackend::new());
/// let mut session = SessionStore::new(
///     "my-app",
///     SessionId::from("abc"),
///     "client-fingerprint",
///     backend,
///     Arc::new(SystemClock),
/// );
///
/// session.init(&SessionOptions::with_timeout(3600));
/// session.set(["user", "name"], "ada");
/// assert_eq!(session.get(["user", "name"]), Some(&"ada".into()));
/// assert!(session.get(["user", "email"]).is_none());
/// ```
pub struct SessionStore {
    key: String,
    id: SessionId,
    fingerprint: String,
    backend: Arc<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
    state: State,
    timeout: u64,
    rolling: bool,
    outcome: Option<InitOutcome>,
}

impl SessionStore {
    /// Create an unloaded store for the record `(id, key)`.
    pub fn new(
        key: impl Into<String>,
        id: SessionId,
        fingerprint: impl Into<String>,
        backend: Arc<dyn SessionBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key: key.into(),
            id,
            fingerprint: fingerprint.into(),
            backend,
            clock,
            state: State::Unloaded,
            timeout: 0,
            rolling: true,
            outcome: None,
        }
    }

    /// Load or create the backing record.
    ///
    /// - No record: a new one is created and bound to the current fingerprint.
    /// - Fingerprint mismatch: the record is left alone and an isolated empty
    ///   session is used instead. Returns [`InitOutcome::HijackSuspected`].
    /// - Expired record: destroyed and replaced by a new one.
    ///
    /// Expiry is pushed forward when rolling is enabled or the record is new.
    pub fn init(&mut self, options: &SessionOptions) -> InitOutcome {
        if let Some(timeout) = options.timeout {
            self.timeout = clamp_timeout(timeout);
        }
        self.rolling = options.rolling;
        let now = self.clock.now();

        let loaded = match self.backend.load(&self.id, &self.key) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(key = %self.key, "Session backend unavailable, using isolated session: {}", e);
                return self.isolate(now, InitOutcome::Unavailable);
            }
        };

        let (record, mut outcome) = match loaded {
            None => (self.fresh_record(now), InitOutcome::Created),
            Some(record) if !fingerprints_match(&record.fingerprint, &self.fingerprint) => {
                warn!(
                    key = %self.key,
                    "Session fingerprint mismatch, possible hijack; isolating request"
                );
                return self.isolate(now, InitOutcome::HijackSuspected);
            }
            Some(record) => (record, InitOutcome::Resumed),
        };

        let record = if record.is_expired(now) {
            info!(key = %self.key, expired_at = record.end, "Session expired, recreating");
            self.state = State::Linked(record);
            self.destroy();
            outcome = InitOutcome::Recreated;
            self.fresh_record(now)
        } else {
            record
        };

        self.state = State::Linked(record);
        if self.rolling || outcome != InitOutcome::Resumed {
            self.apply_timeout(now);
        }
        self.persist();

        debug!(key = %self.key, outcome = ?outcome, "Session initialized");
        self.outcome = Some(outcome);
        outcome
    }

    /// Read the value at `path`.
    ///
    /// Returns `None` as soon as a key along the path is missing, or when the
    /// session was destroyed.
    pub fn get(&mut self, path: impl Into<KeyPath>) -> Option<&Value> {
        self.ensure_loaded();
        let path = path.into();
        let mut node = &self.record()?.data;
        for key in path.keys() {
            node = node.as_object()?.get(key)?;
        }
        Some(node)
    }

    /// Write `value` at `path`, creating intermediate levels.
    ///
    /// Whatever was at `path` is replaced. Non-object values met on the way
    /// are replaced by objects. Writing the root path replaces the whole tree.
    pub fn set(&mut self, path: impl Into<KeyPath>, value: impl Into<Value>) {
        self.ensure_loaded();
        let path = path.into();
        let Some(record) = self.record_mut() else {
            debug!(key = %self.key, "Ignoring write to destroyed session");
            return;
        };
        insert(&mut record.data, path.keys(), value.into());
        self.persist();
    }

    /// Remove and return the value at `path`.
    pub fn remove(&mut self, path: impl Into<KeyPath>) -> Option<Value> {
        self.ensure_loaded();
        let path = path.into();
        let (last, parents) = path.keys().split_last()?;
        let record = self.record_mut()?;

        let mut node = &mut record.data;
        for key in parents {
            node = node.as_object_mut()?.get_mut(key)?;
        }
        let removed = node.as_object_mut()?.remove(last);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    /// Set the lifetime in seconds.
    ///
    /// Negative values clamp to 0, meaning the session never expires.
    /// Re-enables rolling expiry and recomputes the end time from now.
    pub fn set_timeout(&mut self, seconds: i64) {
        self.ensure_loaded();
        self.timeout = clamp_timeout(seconds);
        self.rolling = true;
        let now = self.clock.now();
        self.apply_timeout(now);
        self.persist();
    }

    /// Switch rolling expiry on or off.
    ///
    /// Turning it off rolls the end time back by one timeout period so the
    /// extension granted by the current load is not kept.
    pub fn increment_timeout(&mut self, enabled: bool) {
        self.ensure_loaded();
        if enabled == self.rolling {
            return;
        }
        if enabled {
            self.set_timeout(self.timeout as i64);
            return;
        }

        self.rolling = false;
        let timeout = self.timeout;
        if let Some(record) = self.record_mut() {
            record.end = record.end.saturating_sub(timeout);
        }
        self.persist();
    }

    /// Drop the session.
    ///
    /// The backing record is removed only when this store is linked to it.
    /// An isolated store never deletes anything. A store nobody has read yet
    /// is loaded first so the fingerprint check still applies.
    pub fn destroy(&mut self) {
        self.ensure_loaded();
        let state = std::mem::replace(&mut self.state, State::Destroyed);
        if let State::Linked(_) = state {
            if let Err(e) = self.backend.remove(&self.id, &self.key) {
                warn!(key = %self.key, "Failed to remove session record: {}", e);
            }
        }
    }

    /// The namespace key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The client session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The configured timeout in seconds (0 = never).
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Whether expiry rolls forward on load.
    pub fn is_rolling(&self) -> bool {
        self.rolling
    }

    /// Lifetime to give the transport cookie, in seconds (0 = browser session).
    pub fn cookie_lifetime(&self) -> u64 {
        self.timeout
    }

    /// Creation time of the current record (0 before init or after destroy).
    pub fn start_time(&self) -> u64 {
        self.record().map(|r| r.start).unwrap_or(0)
    }

    /// Expiry time of the current record (0 = never).
    pub fn end_time(&self) -> u64 {
        self.record().map(|r| r.end).unwrap_or(0)
    }

    /// Whether writes reach the backend.
    pub fn is_linked(&self) -> bool {
        matches!(self.state, State::Linked(_))
    }

    /// Whether [`destroy`](Self::destroy) was called.
    pub fn is_destroyed(&self) -> bool {
        matches!(self.state, State::Destroyed)
    }

    /// Result of the last [`init`](Self::init).
    pub fn outcome(&self) -> Option<InitOutcome> {
        self.outcome
    }

    fn ensure_loaded(&mut self) {
        if matches!(self.state, State::Unloaded) {
            self.init(&SessionOptions::default().rolling(self.rolling));
        }
    }

    fn isolate(&mut self, now: u64, outcome: InitOutcome) -> InitOutcome {
        self.state = State::Isolated(SessionRecord::new(String::new(), now));
        self.outcome = Some(outcome);
        outcome
    }

    fn fresh_record(&self, now: u64) -> SessionRecord {
        SessionRecord::new(self.fingerprint.clone(), now)
    }

    fn apply_timeout(&mut self, now: u64) {
        let timeout = self.timeout;
        if let Some(record) = self.record_mut() {
            record.end = if timeout > 0 { now + timeout } else { 0 };
        }
    }

    fn persist(&self) {
        if let State::Linked(record) = &self.state {
            if let Err(e) = self.backend.store(&self.id, &self.key, record.clone()) {
                warn!(key = %self.key, "Failed to persist session: {}", e);
            }
        }
    }

    fn record(&self) -> Option<&SessionRecord> {
        match &self.state {
            State::Linked(record) | State::Isolated(record) => Some(record),
            State::Unloaded | State::Destroyed => None,
        }
    }

    fn record_mut(&mut self) -> Option<&mut SessionRecord> {
        match &mut self.state {
            State::Linked(record) | State::Isolated(record) => Some(record),
            State::Unloaded | State::Destroyed => None,
        }
    }
}

fn clamp_timeout(seconds: i64) -> u64 {
    seconds.max(0) as u64
}

fn insert(node: &mut Value, keys: &[String], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.clone()).or_insert(Value::Null);
        insert(child, rest, value);
    }
}

// =============================================================================
// Tests
// =============================================================================
