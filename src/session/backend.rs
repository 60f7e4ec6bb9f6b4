//! Session persistence.
//!
//! The session store reads and writes whole [`SessionRecord`]s through the
//! [`SessionBackend`] trait. A record lives under a pair of keys: the client's
//! session id (carried by the cookie) and the application's namespace key, so
//! several applications can share one client session without colliding.
//!
//! [`MemoryBackend`] keeps records in an in-process LRU map. When it is full
//! the least recently used record is evicted.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;

/// Default number of records held by [`MemoryBackend`].
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

// =============================================================================
// Session Id
// =============================================================================

/// Opaque client session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Session Record
// =============================================================================

/// The persisted state of one namespaced session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Nested key/value tree
    pub data: Value,

    /// Client fingerprint captured when the record was created
    pub fingerprint: String,

    /// Creation time (Unix seconds)
    pub start: u64,

    /// Expiry time (Unix seconds, 0 = never)
    pub end: u64,
}

impl SessionRecord {
    /// An empty record bound to `fingerprint`.
    pub fn new(fingerprint: impl Into<String>, now: u64) -> Self {
        Self {
            data: Value::Object(Map::new()),
            fingerprint: fingerprint.into(),
            start: now,
            end: 0,
        }
    }

    /// Whether the record expired before `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.end > 0 && now > self.end
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Storage for session records.
///
/// Implementations must be safe to share across requests. Writes are
/// last-write-wins; no read-modify-write atomicity is expected.
pub trait SessionBackend: Send + Sync {
    /// Load the record for `(id, key)`, if any.
    fn load(&self, id: &SessionId, key: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Store (insert or replace) the record for `(id, key)`.
    fn store(&self, id: &SessionId, key: &str, record: SessionRecord) -> Result<(), SessionError>;

    /// Remove the record for `(id, key)`. Removing a missing record is not an error.
    fn remove(&self, id: &SessionId, key: &str) -> Result<(), SessionError>;
}

// =============================================================================
// Memory Backend
// =============================================================================

type RecordKey = (SessionId, String);

/// In-process, LRU-bounded session storage.
///
/// # Example
///
/// ```
/// use waypoint::session::{MemoryBackend, SessionBackend, SessionId, SessionRecord};
///
/// let backend = MemoryBackend::with_capacity(100);
/// let id = SessionId::from("abc");
///
/// backend.store(&id, "app", SessionRecord::new("fp", 1_700_000_000)).unwrap();
/// assert!(backend.load(&id, "app").unwrap().is_some());
/// assert!(backend.load(&id, "other-app").unwrap().is_none());
/// ```
pub struct MemoryBackend {
    records: Mutex<LruCache<RecordKey, SessionRecord>>,
}

impl MemoryBackend {
    /// A backend holding up to [`DEFAULT_SESSION_CAPACITY`] records.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    /// A backend holding up to `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            records: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Whether a record exists, without touching LRU order.
    pub fn contains(&self, id: &SessionId, key: &str) -> bool {
        self.records
            .lock()
            .map(|records| records.contains(&(id.clone(), key.to_string())))
            .unwrap_or(false)
    }

    /// Read a record without touching LRU order.
    pub fn peek(&self, id: &SessionId, key: &str) -> Option<SessionRecord> {
        let records = self.records.lock().ok()?;
        records.peek(&(id.clone(), key.to_string())).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of records.
    pub fn capacity(&self) -> usize {
        self.records.lock().map(|r| r.cap().get()).unwrap_or(0)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self, id: &SessionId, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        let mut records = self.records.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(records.get(&(id.clone(), key.to_string())).cloned())
    }

    fn store(&self, id: &SessionId, key: &str, record: SessionRecord) -> Result<(), SessionError> {
        let mut records = self.records.lock().map_err(|_| SessionError::Poisoned)?;
        records.put((id.clone(), key.to_string()), record);
        Ok(())
    }

    fn remove(&self, id: &SessionId, key: &str) -> Result<(), SessionError> {
        let mut records = self.records.lock().map_err(|_| SessionError::Poisoned)?;
        records.pop(&(id.clone(), key.to_string()));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
