//! HTTP verbs, verb sets and compiled routes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::context::Context;
use crate::error::MountError;

use super::pattern::{Matcher, Params};

// =============================================================================
// Verbs
// =============================================================================

/// The HTTP methods a route can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Verb {
    /// Every supported verb.
    pub const ALL: [Verb; 7] = [
        Verb::Get,
        Verb::Head,
        Verb::Post,
        Verb::Put,
        Verb::Patch,
        Verb::Delete,
        Verb::Options,
    ];

    /// Canonical upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Options => "OPTIONS",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = MountError;

    /// Parse a method name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MountError::UnknownVerb(s.to_string()))
    }
}

impl TryFrom<&http::Method> for Verb {
    type Error = MountError;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// A set of verbs. The empty set accepts any verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerbSet(u8);

impl VerbSet {
    /// The wildcard set: matches every verb.
    pub const ANY: VerbSet = VerbSet(0);

    /// A set holding exactly one verb.
    pub fn only(verb: Verb) -> Self {
        Self(verb.bit())
    }

    /// Add a verb to the set.
    pub fn with(self, verb: Verb) -> Self {
        Self(self.0 | verb.bit())
    }

    /// Whether this is the wildcard set.
    pub fn is_any(self) -> bool {
        self.0 == 0
    }

    /// Whether a request with `verb` is accepted.
    pub fn accepts(self, verb: Verb) -> bool {
        self.is_any() || self.0 & verb.bit() != 0
    }
}

impl From<Verb> for VerbSet {
    fn from(verb: Verb) -> Self {
        Self::only(verb)
    }
}

impl FromIterator<Verb> for VerbSet {
    fn from_iter<I: IntoIterator<Item = Verb>>(iter: I) -> Self {
        iter.into_iter().fold(Self::ANY, VerbSet::with)
    }
}

impl<const N: usize> From<[Verb; N]> for VerbSet {
    fn from(verbs: [Verb; N]) -> Self {
        verbs.into_iter().collect()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// A route handler.
///
/// Handlers act through the context (reply, session) and return nothing.
pub type Handler = Arc<dyn Fn(&mut Context<'_>, &Params) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
{
    Arc::new(f)
}

// =============================================================================
// Route
// =============================================================================

/// A compiled pattern bound to a verb set and a handler.
#[derive(Clone)]
pub struct Route {
    verbs: VerbSet,
    matcher: Matcher,
    handler: Handler,
}

impl Route {
    /// Compile `pattern` and bind it.
    pub fn new(verbs: impl Into<VerbSet>, pattern: &str, handler: Handler) -> Self {
        Self {
            verbs: verbs.into(),
            matcher: Matcher::compile(pattern),
            handler,
        }
    }

    /// The verbs this route answers.
    pub fn verbs(&self) -> VerbSet {
        self.verbs
    }

    /// The normalized pattern.
    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    /// Test the route against a request, returning captures on a hit.
    pub fn matches(&self, verb: Verb, path: &str) -> Option<Params> {
        if !self.verbs.accepts(verb) {
            return None;
        }
        self.matcher.match_path(path)
    }

    /// Invoke the handler.
    pub fn fire(&self, ctx: &mut Context<'_>, params: &Params) {
        (self.handler)(ctx, params)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("verbs", &self.verbs)
            .field("pattern", &self.matcher.pattern())
            .finish_non_exhaustive()
    }
}
