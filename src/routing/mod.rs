//! Request routing.
//!
//! - [`pattern`]: path normalization, pattern parsing and matching
//! - [`route`]: verbs, verb sets, handlers and compiled routes
//! - [`router`]: ordered route tables, mounts and static bindings
//! - [`table`]: declarative route tables and the handler registry

pub mod pattern;
pub mod route;
pub mod router;
pub mod table;

pub use pattern::{normalize, Matcher, Params, Pattern, Segment, ROOT_PATH};
pub use route::{handler, Handler, Route, Verb, VerbSet};
pub use router::{DispatchOutcome, Router, StaticFile};
pub use table::{load_route_file, parse_route_table, HandlerRegistry, RouteDef};
