//! Declarative route tables.
//!
//! A route table names its handlers instead of holding them, so it can be
//! written in a file and mounted at startup. Names are resolved through a
//! [`HandlerRegistry`].
//!
//! # File Format
//!
//! ```toml
//! [[route]]
//! verbs = ["GET", "HEAD"]
//! pattern = "/users/:id"
//! handler = "show_user"
//!
//! [[route]]
//! pattern = "/ping"      # no verbs: any verb
//! handler = "pong"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::context::Context;
use crate::error::MountError;

use super::pattern::Params;
use super::route::{handler, Handler, Verb, VerbSet};

/// One entry of a route table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteDef {
    /// Verb names; empty means any verb
    #[serde(default)]
    pub verbs: Vec<String>,

    /// Route pattern, relative to the mount prefix
    pub pattern: String,

    /// Name of a registered handler
    pub handler: String,
}

impl RouteDef {
    /// Build an entry.
    pub fn new<I, S>(verbs: I, pattern: impl Into<String>, handler: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            verbs: verbs.into_iter().map(Into::into).collect(),
            pattern: pattern.into(),
            handler: handler.into(),
        }
    }

    /// Parse the verb names.
    pub fn verb_set(&self) -> Result<VerbSet, MountError> {
        self.verbs.iter().map(|v| v.parse::<Verb>()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(default, rename = "route")]
    routes: Vec<RouteDef>,
}

/// Parse a TOML route table. `origin` names the source in errors.
pub fn parse_route_table(text: &str, origin: &str) -> Result<Vec<RouteDef>, MountError> {
    let file: RouteFile = toml::from_str(text).map_err(|e| MountError::Invalid {
        path: origin.to_string(),
        message: e.to_string(),
    })?;
    Ok(file.routes)
}

/// Read and parse a TOML route file.
pub fn load_route_file(path: &Path) -> Result<Vec<RouteDef>, MountError> {
    let text = std::fs::read_to_string(path).map_err(|e| MountError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_route_table(&text, &path.display().to_string())
}

/// Handlers addressable by name from route tables.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`, replacing any previous handler.
    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), handler(f));
        self
    }

    /// Look up a handler.
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve one entry.
    pub fn resolve(&self, def: &RouteDef) -> Result<(VerbSet, String, Handler), MountError> {
        let verbs = def.verb_set()?;
        let handler = self
            .get(&def.handler)
            .ok_or_else(|| MountError::UnknownHandler(def.handler.clone()))?;
        Ok((verbs, def.pattern.clone(), handler))
    }

    /// Resolve a whole table; the first bad entry fails it.
    pub fn resolve_all(
        &self,
        table: &[RouteDef],
    ) -> Result<Vec<(VerbSet, String, Handler)>, MountError> {
        table.iter().map(|def| self.resolve(def)).collect()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
