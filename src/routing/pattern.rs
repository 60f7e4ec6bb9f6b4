//! Route pattern parsing and matching.
//!
//! A route pattern is a path template made of three kinds of segment:
//!
//! ```text
//! /users/:id/files/*
//! └────┬─┘└┬┘└──┬──┘└┬┘
//!   literal │ literal wildcard
//!        named
//! ```
//!
//! - **Literal** text must appear verbatim in the request path.
//! - **Named** captures (`:name`) bind one non-empty token of
//!   `[A-Za-z0-9_.-]`. They never cross a `/`.
//! - **Wildcards** (`*`) bind a possibly empty run of `[A-Za-z0-9_./-]`,
//!   separators included. They are greedy.
//!
//! Patterns are parsed once into a [`Pattern`] and compiled into a
//! [`Matcher`]. Patterns without captures compile to a plain string
//! comparison. Matching is anchored at both ends of the path and backtracks
//! when a greedy capture swallows text a later segment needs.

use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::error::PatternError;

// =============================================================================
// Path Normalization
// =============================================================================

/// Canonical form of the root path.
pub const ROOT_PATH: &str = "/";

/// Normalize a request path (or a route pattern) into canonical form.
///
/// - Everything from the first `?` or `#` is dropped
/// - Runs of `/` collapse into one
/// - A trailing `/` is removed, except for the root itself
/// - The result always starts with `/`; the empty string becomes the root
///
/// Normalization is idempotent.
pub fn normalize(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];

    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }

    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

// =============================================================================
// Pattern AST
// =============================================================================

/// One parsed piece of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text that must match exactly
    Literal(String),

    /// `:name`, one token without separators
    Named(String),

    /// `*`, the greedy remainder
    Wildcard,
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a pattern string.
    ///
    /// The input is normalized first, so `"/users/"` and `"//users"` parse to
    /// the same pattern as `"/users"`. A `:` that is not followed by an ASCII
    /// letter is literal text.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let source = normalize(source);
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut names: Vec<&str> = Vec::new();

        let bytes = source.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'*' => {
                    flush_literal(&mut literal, &mut segments);
                    segments.push(Segment::Wildcard);
                    i += 1;
                }
                b':' if bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) => {
                    flush_literal(&mut literal, &mut segments);
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && is_identifier_byte(bytes[end]) {
                        end += 1;
                    }
                    let name = &source[start..end];
                    if names.contains(&name) {
                        return Err(PatternError::DuplicateCapture {
                            pattern: source.clone(),
                            name: name.to_string(),
                        });
                    }
                    names.push(name);
                    segments.push(Segment::Named(name.to_string()));
                    i = end;
                }
                _ => {
                    // Multi-byte characters are copied whole
                    let ch = source[i..].chars().next().unwrap_or_default();
                    literal.push(ch);
                    i += ch.len_utf8().max(1);
                }
            }
        }
        flush_literal(&mut literal, &mut segments);

        Ok(Self { source, segments })
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The parsed segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the pattern contains any named capture or wildcard.
    pub fn has_captures(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// Literal text before the first capture.
    ///
    /// Every path the pattern can match starts with this prefix.
    pub fn literal_prefix(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Literal(text)) => text,
            _ => "",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn flush_literal(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Characters a capture may bind. Wildcards additionally accept `/`.
fn is_token_byte(b: u8, allow_separator: bool) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-') || (allow_separator && b == b'/')
}

// =============================================================================
// Captured Parameters
// =============================================================================

/// Substrings captured by a successful match.
///
/// Captures are exposed positionally, in pattern order, and by name for named
/// captures. Both views index the same underlying values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: Vec<String>,
    names: Vec<Option<String>>,
}

impl Params {
    /// Positional capture at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Named capture `name`.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .and_then(|i| self.get(i))
    }

    /// All positional captures.
    pub fn positional(&self) -> &[String] {
        &self.values
    }

    /// Named captures as `(name, value)` pairs, in pattern order.
    pub fn iter_named(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .zip(&self.values)
            .filter_map(|(name, value)| name.as_deref().map(|n| (n, value.as_str())))
    }

    /// Number of captures.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// =============================================================================
// Matcher
// =============================================================================

#[derive(Debug, Clone)]
enum MatcherKind {
    /// No captures: plain equality
    Exact(String),

    /// Backtracking match over parsed segments
    Segments(Vec<Segment>),

    /// Pattern was rejected
    Never,
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    literal_prefix: String,
    kind: MatcherKind,
}

impl Matcher {
    /// Compile a pattern string.
    ///
    /// Compilation never fails. A pattern that cannot be parsed is logged and
    /// yields a matcher that rejects every path, so route registration is
    /// never blocked by one bad entry.
    pub fn compile(pattern: &str) -> Self {
        match Pattern::parse(pattern) {
            Ok(parsed) => Self::from_pattern(parsed),
            Err(e) => {
                warn!(pattern = pattern, "Route pattern rejected: {}", e);
                Self {
                    pattern: normalize(pattern),
                    literal_prefix: String::new(),
                    kind: MatcherKind::Never,
                }
            }
        }
    }

    /// Compile an already parsed pattern.
    pub fn from_pattern(pattern: Pattern) -> Self {
        let literal_prefix = pattern.literal_prefix().to_string();
        let kind = if pattern.has_captures() {
            MatcherKind::Segments(pattern.segments.clone())
        } else {
            MatcherKind::Exact(pattern.source.clone())
        };
        Self {
            pattern: pattern.source,
            literal_prefix,
            kind,
        }
    }

    /// The normalized pattern this matcher was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Literal text before the first capture.
    pub fn literal_prefix(&self) -> &str {
        &self.literal_prefix
    }

    /// Whether this matcher can never match anything.
    pub fn is_never(&self) -> bool {
        matches!(self.kind, MatcherKind::Never)
    }

    /// Match a normalized path, returning the captures on success.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        match &self.kind {
            MatcherKind::Exact(expected) => (expected == path).then(Params::default),
            MatcherKind::Segments(segments) => {
                let mut search = Search::new(segments, path);
                if !search.run(0, 0) {
                    return None;
                }
                let spans = search.spans;
                let names = segments
                    .iter()
                    .filter_map(|s| match s {
                        Segment::Named(name) => Some(Some(name.clone())),
                        Segment::Wildcard => Some(None),
                        Segment::Literal(_) => None,
                    })
                    .collect();
                let values = spans
                    .into_iter()
                    .map(|(start, end)| path[start..end].to_string())
                    .collect();
                Some(Params { values, names })
            }
            MatcherKind::Never => None,
        }
    }

    /// Whether the path matches, discarding captures.
    pub fn is_match(&self, path: &str) -> bool {
        self.match_path(path).is_some()
    }
}

/// Backtracking search over a segment list.
///
/// Failed `(segment, position)` states are remembered, so each state is
/// explored at most once and matching stays polynomial in the path length.
/// Captures only ever end on ASCII bytes, so every recorded span lies on
/// character boundaries.
struct Search<'a> {
    segments: &'a [Segment],
    path: &'a str,
    spans: Vec<(usize, usize)>,
    failed: HashSet<(usize, usize)>,
}

impl<'a> Search<'a> {
    fn new(segments: &'a [Segment], path: &'a str) -> Self {
        Self {
            segments,
            path,
            spans: Vec::new(),
            failed: HashSet::new(),
        }
    }

    fn run(&mut self, index: usize, pos: usize) -> bool {
        if self.failed.contains(&(index, pos)) {
            return false;
        }
        let matched = self.step(index, pos);
        if !matched {
            self.failed.insert((index, pos));
        }
        matched
    }

    fn step(&mut self, index: usize, pos: usize) -> bool {
        let path = self.path;
        let Some(segment) = self.segments.get(index) else {
            return pos == path.len();
        };

        let (allow_separator, min_len) = match segment {
            Segment::Literal(text) => {
                return path[pos..].starts_with(text.as_str())
                    && self.run(index + 1, pos + text.len());
            }
            Segment::Named(_) => (false, 1),
            Segment::Wildcard => (true, 0),
        };

        let run = path.as_bytes()[pos..]
            .iter()
            .take_while(|b| is_token_byte(**b, allow_separator))
            .count();

        for end in (pos + min_len..=pos + run).rev() {
            self.spans.push((pos, end));
            if self.run(index + 1, end) {
                return true;
            }
            self.spans.pop();
        }
        false
    }
}

// =============================================================================
// Tests
// =============================================================================
