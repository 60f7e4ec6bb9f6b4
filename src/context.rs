//! Per-request context handed to route handlers.
//!
//! A [`Context`] bundles everything one dispatch needs: the request facts,
//! the normalized path, the request's [`SessionStore`] and the [`Reply`]
//! being built. The whole router tree, mounted sub-routers included, shares
//! one context by mutable reference, so every handler sees the same session.

use std::path::PathBuf;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use tracing::warn;
use url::form_urlencoded;

use crate::routing::{normalize, Verb};
use crate::session::SessionStore;

// =============================================================================
// Request Facts
// =============================================================================

/// What the router and session store need to know about an incoming request.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    /// Request verb
    pub verb: Verb,

    /// Raw request target (path, possibly with a query string)
    pub target: String,

    /// `User-Agent` header, empty when absent
    pub user_agent: String,

    /// `Host` header, empty when absent
    pub host: String,
}

impl RequestFacts {
    /// Facts for a request without client headers.
    pub fn new(verb: Verb, target: impl Into<String>) -> Self {
        Self {
            verb,
            target: target.into(),
            user_agent: String::new(),
            host: String::new(),
        }
    }

    /// Set the client headers used for session fingerprinting.
    pub fn with_client(mut self, user_agent: impl Into<String>, host: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self.host = host.into();
        self
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        let (_, rest) = self.target.split_once('?')?;
        Some(rest.split('#').next().unwrap_or(rest))
    }
}

// =============================================================================
// Context
// =============================================================================

/// Mutable per-request state shared by every router in the tree.
pub struct Context<'a> {
    request: RequestFacts,
    base_url: String,
    path: String,
    session: &'a mut SessionStore,
    reply: Reply,
}

impl<'a> Context<'a> {
    /// Build a context, stripping `base_url` from the request path before
    /// normalizing it.
    pub fn new(request: RequestFacts, base_url: &str, session: &'a mut SessionStore) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let path = normalize(strip_base(&request.target, &base_url));
        Self {
            request,
            base_url,
            path,
            session,
            reply: Reply::default(),
        }
    }

    /// The request verb.
    pub fn verb(&self) -> Verb {
        self.request.verb
    }

    /// The normalized path, relative to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The base URL the application is served under (empty for the root).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The raw request facts.
    pub fn request(&self) -> &RequestFacts {
        &self.request
    }

    /// First value of query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.request.query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// The request's session.
    pub fn session(&mut self) -> &mut SessionStore {
        &mut *self.session
    }

    /// The reply under construction.
    pub fn reply(&mut self) -> &mut Reply {
        &mut self.reply
    }

    /// Redirect to `url`.
    ///
    /// Local redirects are prefixed with the base URL. Permanent redirects use
    /// 301, the rest 302.
    pub fn redirect(&mut self, url: &str, local: bool, permanent: bool) {
        let location = if local {
            format!("{}{}", self.base_url, url)
        } else {
            url.to_string()
        };
        let status = if permanent {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::FOUND
        };
        self.reply.status(status);
        self.reply.set_header(LOCATION, &location);
    }

    /// Consume the context, yielding the reply.
    pub fn into_reply(self) -> Reply {
        self.reply
    }
}

/// Strip `base` from the front of `target` when it ends on a segment boundary.
fn strip_base<'t>(target: &'t str, base: &str) -> &'t str {
    if base.is_empty() {
        return target;
    }
    match target.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '?', '#']) => rest,
        _ => target,
    }
}

// =============================================================================
// Reply
// =============================================================================

/// Body of a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReplyBody {
    /// Nothing was sent
    #[default]
    Empty,

    /// In-memory payload
    Bytes(Bytes),

    /// A file to stream; the file sender checks existence and MIME type
    File {
        path: PathBuf,
        content_type: Option<String>,
    },
}

/// The response a handler builds.
///
/// A handler that sends nothing leaves a `200` with an empty body.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: ReplyBody,
}

impl Reply {
    /// Set the status code.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any previous value.
    ///
    /// Values that are not valid header text are dropped with a warning.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> &mut Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => warn!(header = %name, "Dropping invalid header value"),
        }
        self
    }

    /// Send a JSON document.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        match serde_json::to_vec(value) {
            Ok(body) => self.send_bytes(body, "application/json"),
            Err(e) => {
                warn!("Failed to serialize JSON reply: {}", e);
                self.status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Send plain text.
    pub fn send_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.send_bytes(text.into(), "text/plain; charset=utf-8")
    }

    /// Send raw bytes with a content type.
    pub fn send_bytes(&mut self, body: impl Into<Bytes>, content_type: &str) -> &mut Self {
        self.set_header(CONTENT_TYPE, content_type);
        self.body = ReplyBody::Bytes(body.into());
        self
    }

    /// Stream a file. `content_type` forces the MIME type, otherwise it is
    /// guessed from the extension when the file is sent.
    pub fn send_file(&mut self, path: impl Into<PathBuf>, content_type: Option<&str>) -> &mut Self {
        self.headers.remove(CONTENT_TYPE);
        self.body = ReplyBody::File {
            path: path.into(),
            content_type: content_type.map(str::to_string),
        };
        self
    }

    /// The status code.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// The headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body.
    pub fn body(&self) -> &ReplyBody {
        &self.body
    }

    /// Split into parts.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, ReplyBody) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query() {
        let facts = RequestFacts::new(Verb::Get, "/search?q=rust&page=2#results");
        assert_eq!(facts.query(), Some("q=rust&page=2"));
        assert_eq!(RequestFacts::new(Verb::Get, "/").query(), None);
    }

    #[test]
    fn test_strip_base() {
        assert_eq!(strip_base("/app/users", "/app"), "/users");
        assert_eq!(strip_base("/app", "/app"), "");
        assert_eq!(strip_base("/app?x=1", "/app"), "?x=1");
        assert_eq!(strip_base("/application", "/app"), "/application");
        assert_eq!(strip_base("/users", ""), "/users");
    }

    #[test]
    fn test_reply_defaults() {
        let reply = Reply::default();
        assert_eq!(reply.status_code(), StatusCode::OK);
        assert_eq!(reply.body(), &ReplyBody::Empty);
    }

    #[test]
    fn test_reply_json() {
        let mut reply = Reply::default();
        reply.send_json(&serde_json::json!({ "ok": true }));
        assert_eq!(reply.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            reply.body(),
            &ReplyBody::Bytes(Bytes::from_static(br#"{"ok":true}"#))
        );
    }

    #[test]
    fn test_reply_invalid_header_dropped() {
        let mut reply = Reply::default();
        reply.set_header(LOCATION, "bad\nvalue");
        assert!(reply.headers().get(LOCATION).is_none());
    }
}
