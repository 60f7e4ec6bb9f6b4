//! Ordered route tables, mounts and static-asset bindings.
//!
//! # Dispatch Order
//!
//! ```text
//! request path (normalized)
//!   │
//!   ├─▶ static bindings (by extension / by entry prefix)
//!   │     hit ─▶ Reply::send_file ─▶ DispatchOutcome::Static
//!   │
//!   └─▶ entries, in registration order
//!         Route  ─▶ verb + pattern match ─▶ fire handler ─▶ Handled
//!         Mount  ─▶ literal prefix gate ─▶ child router (same order)
//!
//! nothing matched ─▶ DispatchOutcome::NoMatch (reply left untouched)
//! ```
//!
//! At most one handler fires per dispatch. A router is built once, then
//! shared immutably across requests.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::{debug, warn};

use crate::context::Context;

use super::pattern::{normalize, Params, Pattern};
use super::route::{handler, Route, Verb, VerbSet};
use super::table::{load_route_file, HandlerRegistry, RouteDef};

// =============================================================================
// Dispatch Outcome
// =============================================================================

/// What a dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A route handler fired
    Handled {
        /// Full pattern of the route that fired
        pattern: String,
    },

    /// A static binding handed the request to the file sender
    Static(StaticFile),

    /// Nothing matched; the reply is untouched
    NoMatch,
}

impl DispatchOutcome {
    /// Whether anything answered the request.
    pub fn is_match(&self) -> bool {
        !matches!(self, DispatchOutcome::NoMatch)
    }
}

/// A file chosen by a static binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    /// Resolved filesystem path
    pub path: PathBuf,

    /// Forced content type, if the binding has one
    pub content_type: Option<String>,
}

/// Mounts recurse, so dispatch futures are boxed.
type DispatchFuture<'a> = Pin<Box<dyn Future<Output = DispatchOutcome> + Send + 'a>>;

// =============================================================================
// Static Bindings
// =============================================================================

#[derive(Debug, Clone)]
enum Selector {
    /// Last path segment ends in one of these extensions (lower-case, no dot)
    Extensions(Vec<String>),

    /// Path sits under this normalized prefix
    Entry(String),
}

#[derive(Debug, Clone)]
struct StaticBinding {
    selector: Selector,
    folder: PathBuf,
    content_type: Option<String>,
    error_not_found: bool,
}

impl StaticBinding {
    /// Resolve `path` to a file, or `None` to fall through to the routes.
    async fn resolve(&self, path: &str) -> Option<StaticFile> {
        let relative = match &self.selector {
            Selector::Extensions(exts) => {
                let ext = extension(path)?;
                exts.iter().any(|e| e == &ext).then_some(path)?
            }
            Selector::Entry(prefix) => strip_entry(path, prefix)?,
        };

        let relative = relative.trim_start_matches('/');
        if relative.split('/').any(|segment| segment == "..") {
            debug!(path = path, "Refusing static path with parent segment");
            return None;
        }

        let file = self.folder.join(relative);
        if !self.error_not_found && !is_file(&file).await {
            return None;
        }
        Some(StaticFile {
            path: file,
            content_type: self.content_type.clone(),
        })
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Lower-cased extension of the last segment of `path`.
fn extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Remainder of `path` under `prefix`, on a segment boundary.
fn strip_entry<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    if prefix == "/" {
        return Some(path);
    }
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

// =============================================================================
// Router
// =============================================================================

enum Entry {
    Route(Route),
    Mount(Mount),
}

struct Mount {
    /// Text every path reaching this mount starts with
    gate: String,
    router: Router,
}

/// An ordered route table.
///
/// # Example
///
/// ```
/// use waypoint::routing::Router;
///
/// let router = Router::new()
///     .get("/", |ctx, _| {
///         ctx.reply().send_text("home");
///     })
///     .mount("/api", |api| {
///         api.get("/users/:id", |ctx, params| {
///             let id = params.named("id").unwrap_or_default().to_string();
///             ctx.reply().send_json(&serde_json::json!({ "id": id }));
///         })
///     });
///
/// assert_eq!(router.patterns(), vec!["/", "/api/users/:id"]);
/// ```
#[derive(Default)]
pub struct Router {
    /// Composed mount prefix; empty for the root router
    prefix: String,
    statics: Vec<StaticBinding>,
    entries: Vec<Entry>,
}

impl Router {
    /// An empty root router.
    pub fn new() -> Self {
        Self::default()
    }

    fn nested(prefix: String) -> Self {
        Self {
            prefix,
            ..Self::default()
        }
    }

    /// The composed prefix routes of this router are registered under.
    pub fn prefix(&self) -> &str {
        if self.prefix.is_empty() {
            "/"
        } else {
            &self.prefix
        }
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a handler for `verbs` on `pattern`.
    pub fn route<F>(self, verbs: impl Into<VerbSet>, pattern: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        let route = Route::new(verbs, &self.join(pattern), handler(f));
        self.push(route)
    }

    /// Register a handler for any verb.
    pub fn on<F>(self, pattern: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        self.route(VerbSet::ANY, pattern, f)
    }

    /// Register a `GET` handler.
    pub fn get<F>(self, pattern: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        self.route(Verb::Get, pattern, f)
    }

    /// Register a `POST` handler.
    pub fn post<F>(self, pattern: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        self.route(Verb::Post, pattern, f)
    }

    /// Register a `PUT` handler.
    pub fn put<F>(self, pattern: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        self.route(Verb::Put, pattern, f)
    }

    /// Register a `PATCH` handler.
    pub fn patch<F>(self, pattern: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        self.route(Verb::Patch, pattern, f)
    }

    /// Register a `DELETE` handler.
    pub fn delete<F>(self, pattern: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Params) + Send + Sync + 'static,
    {
        self.route(Verb::Delete, pattern, f)
    }

    fn push(mut self, route: Route) -> Self {
        self.entries.push(Entry::Route(route));
        self
    }

    /// Prepend this router's prefix to `pattern`. Normalization happens when
    /// the result is compiled.
    fn join(&self, pattern: &str) -> String {
        if self.prefix.is_empty() {
            pattern.to_string()
        } else {
            format!("{}/{}", self.prefix, pattern)
        }
    }

    // -------------------------------------------------------------------------
    // Mounts
    // -------------------------------------------------------------------------

    /// Mount a sub-router built by `build` under `prefix`.
    ///
    /// The prefix may contain captures; they are delivered to the mounted
    /// handlers ahead of the handlers' own captures. A prefix that cannot be
    /// parsed skips the mount.
    pub fn mount<F>(mut self, prefix: &str, build: F) -> Self
    where
        F: FnOnce(Router) -> Router,
    {
        let composed = normalize(&self.join(prefix));
        let gate = match Pattern::parse(&composed) {
            Ok(pattern) => pattern.literal_prefix().to_string(),
            Err(e) => {
                warn!(prefix = prefix, "Skipping mount: {}", e);
                return self;
            }
        };

        let child_prefix = if composed == "/" { String::new() } else { composed };
        let router = build(Router::nested(child_prefix));
        self.entries.push(Entry::Mount(Mount { gate, router }));
        self
    }

    /// Mount a declarative route table under `prefix`.
    ///
    /// Every entry must name a registered handler and known verbs, otherwise
    /// the whole mount is skipped.
    pub fn mount_table(self, prefix: &str, table: &[RouteDef], registry: &HandlerRegistry) -> Self {
        match registry.resolve_all(table) {
            Ok(resolved) => self.mount(prefix, |mut router| {
                for (verbs, pattern, handler) in resolved {
                    let route = Route::new(verbs, &router.join(&pattern), handler);
                    router = router.push(route);
                }
                router
            }),
            Err(e) => {
                warn!(prefix = prefix, "Skipping mount: {}", e);
                self
            }
        }
    }

    /// Mount the route table stored in a TOML file under `prefix`.
    ///
    /// An unreadable or invalid file skips the mount.
    pub fn mount_file(
        self,
        prefix: &str,
        path: impl AsRef<Path>,
        registry: &HandlerRegistry,
    ) -> Self {
        match load_route_file(path.as_ref()) {
            Ok(table) => self.mount_table(prefix, &table, registry),
            Err(e) => {
                warn!(prefix = prefix, "Skipping mount: {}", e);
                self
            }
        }
    }

    // -------------------------------------------------------------------------
    // Static Bindings
    // -------------------------------------------------------------------------

    /// Serve files from `folder` for paths ending in one of `extensions`.
    ///
    /// The whole request path is resolved under `folder`. Without
    /// `error_not_found`, a missing file falls through to the route table.
    pub fn by_ext<I, S>(
        mut self,
        extensions: I,
        folder: impl Into<PathBuf>,
        content_type: Option<&str>,
        error_not_found: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self.statics.push(StaticBinding {
            selector: Selector::Extensions(extensions),
            folder: folder.into(),
            content_type: content_type.map(str::to_string),
            error_not_found,
        });
        self
    }

    /// Serve files from `folder` for paths under `prefix`.
    ///
    /// The text after `prefix` is resolved under `folder`.
    pub fn by_entry(
        mut self,
        prefix: &str,
        folder: impl Into<PathBuf>,
        content_type: Option<&str>,
        error_not_found: bool,
    ) -> Self {
        let prefix = normalize(&self.join(prefix));
        self.statics.push(StaticBinding {
            selector: Selector::Entry(prefix),
            folder: folder.into(),
            content_type: content_type.map(str::to_string),
            error_not_found,
        });
        self
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Route one request.
    ///
    /// Fires at most one handler. Static bindings answer only `GET` and
    /// `HEAD`; checking whether their file exists is the only await.
    pub async fn dispatch(&self, ctx: &mut Context<'_>) -> DispatchOutcome {
        let path = ctx.path().to_string();
        let verb = ctx.verb();
        self.dispatch_path(verb, &path, ctx).await
    }

    fn dispatch_path<'a>(
        &'a self,
        verb: Verb,
        path: &'a str,
        ctx: &'a mut Context<'_>,
    ) -> DispatchFuture<'a> {
        Box::pin(async move {
            if matches!(verb, Verb::Get | Verb::Head) {
                for binding in &self.statics {
                    if let Some(file) = binding.resolve(path).await {
                        debug!(path = path, file = %file.path.display(), "Static file hand-off");
                        ctx.reply()
                            .send_file(file.path.clone(), file.content_type.as_deref());
                        return DispatchOutcome::Static(file);
                    }
                }
            }

            for entry in &self.entries {
                match entry {
                    Entry::Route(route) => {
                        if let Some(params) = route.matches(verb, path) {
                            debug!(verb = %verb, path = path, pattern = route.pattern(), "Route matched");
                            route.fire(ctx, &params);
                            return DispatchOutcome::Handled {
                                pattern: route.pattern().to_string(),
                            };
                        }
                    }
                    Entry::Mount(mount) => {
                        if !path.starts_with(&mount.gate) {
                            continue;
                        }
                        let outcome = mount.router.dispatch_path(verb, path, ctx).await;
                        if outcome.is_match() {
                            return outcome;
                        }
                    }
                }
            }

            DispatchOutcome::NoMatch
        })
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Full patterns of every route, mounts flattened, in dispatch order.
    pub fn patterns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns(&self, out: &mut Vec<String>) {
        for entry in &self.entries {
            match entry {
                Entry::Route(route) => out.push(route.pattern().to_string()),
                Entry::Mount(mount) => mount.router.collect_patterns(out),
            }
        }
    }

    /// Number of routes, mounts flattened.
    pub fn route_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry {
                Entry::Route(_) => 1,
                Entry::Mount(mount) => mount.router.route_count(),
            })
            .sum()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix())
            .field("statics", &self.statics.len())
            .field("routes", &self.patterns())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
