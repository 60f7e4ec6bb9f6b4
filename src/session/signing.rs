//! HMAC-SHA256 signing for session cookies and client fingerprints.
//!
//! # Cookie Format
//!
//! The session cookie carries the session id and a signature over it:
//!
//! ```text
//! cookie    = "{id}.{signature}"
//! signature = hex(HMAC-SHA256(secret, "sid:" + id))
//! ```
//!
//! A cookie whose signature does not verify is discarded and a new id is
//! issued, so a client cannot pick an id of its choosing.
//!
//! # Fingerprints
//!
//! A fingerprint binds a session to the client that created it:
//!
//! ```text
//! fingerprint = hex(HMAC-SHA256(secret, "fp:" + user_agent + "\n" + host))
//! ```
//!
//! Both comparisons are constant-time.
//!
//! # Example
//!
//! ```rust
//! use waypoint::session::SessionSigner;
//!
//! let signer = SessionSigner::new("a-long-random-server-secret");
//! let (id, cookie) = signer.issue();
//!
//! assert_eq!(signer.verify(&cookie).unwrap(), id);
//! assert!(signer.verify("forged.00ff").is_err());
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::SessionError;

use super::backend::SessionId;

type HmacSha256 = Hmac<Sha256>;

/// Signs session ids and derives client fingerprints.
#[derive(Clone)]
pub struct SessionSigner {
    secret_key: Vec<u8>,
}

impl SessionSigner {
    /// Create a signer. The secret should be at least 32 bytes.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Generate a fresh session id and its cookie value.
    pub fn issue(&self) -> (SessionId, String) {
        let id = SessionId::generate();
        let cookie = self.cookie_value(&id);
        (id, cookie)
    }

    /// The signed cookie value for `id`.
    pub fn cookie_value(&self, id: &SessionId) -> String {
        format!("{}.{}", id, self.mac_hex(&["sid:", id.as_str()]))
    }

    /// Verify a cookie value, returning the session id it carries.
    pub fn verify(&self, cookie: &str) -> Result<SessionId, SessionError> {
        let (id, signature) = cookie
            .rsplit_once('.')
            .filter(|(id, sig)| !id.is_empty() && !sig.is_empty())
            .ok_or(SessionError::MalformedCookie)?;

        let provided = hex::decode(signature).map_err(|_| SessionError::MalformedCookie)?;
        let expected = self.mac(&["sid:", id]);

        if provided.ct_eq(&expected).into() {
            Ok(SessionId::from(id))
        } else {
            Err(SessionError::InvalidSignature)
        }
    }

    /// Fingerprint a client from its user agent and host.
    pub fn fingerprint(&self, user_agent: &str, host: &str) -> String {
        self.mac_hex(&["fp:", user_agent, "\n", host])
    }

    fn mac(&self, parts: &[&str]) -> Vec<u8> {
        // HMAC accepts keys of any length, so this cannot fail
        let mut mac = match HmacSha256::new_from_slice(&self.secret_key) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        for part in parts {
            mac.update(part.as_bytes());
        }
        mac.finalize().into_bytes().to_vec()
    }

    fn mac_hex(&self, parts: &[&str]) -> String {
        hex::encode(self.mac(parts))
    }
}

/// Constant-time fingerprint comparison.
pub fn fingerprints_match(stored: &str, current: &str) -> bool {
    stored.as_bytes().ct_eq(current.as_bytes()).into()
}
