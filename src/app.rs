//! The application served by the `waypoint` binary.
//!
//! # Routes
//!
//! ```text
//! *.css *.js *.png ...        - static files from the public folder
//! /static/*                   - static files, 404 when missing
//! GET  /                      - service banner
//! GET  /visits                - per-session visit counter
//! GET  /session               - session metadata
//! POST /session/timeout/:secs - change the session lifetime
//! POST /logout                - destroy the session, redirect home
//! GET  /api/users/:id         - echo a user id
//! GET  /api/files/*           - echo a file path
//! (routes file, if any)       - mounted at the root
//! *    /*                     - JSON 404
//! ```

use std::path::{Path, PathBuf};

use http::StatusCode;
use serde_json::{json, Value};

use crate::context::Context;
use crate::routing::{HandlerRegistry, Params, Router};
use crate::server::ErrorResponse;

/// Extensions served straight from the public folder.
pub const ASSET_EXTENSIONS: [&str; 11] = [
    "css", "js", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff2",
];

/// Build the application router.
pub fn build_router(public_dir: &Path, routes_file: Option<&PathBuf>) -> Router {
    let mut router = Router::new()
        .by_ext(ASSET_EXTENSIONS, public_dir, None, false)
        .by_entry("/static", public_dir, None, true)
        .get("/", home)
        .get("/visits", visits)
        .get("/session", session_info)
        .post("/session/timeout/:seconds", set_timeout)
        .post("/logout", logout)
        .mount("/api", |api| {
            api.get("/users/:id", show_user).get("/files/*", show_file)
        });

    if let Some(path) = routes_file {
        router = router.mount_file("/", path, &builtin_handlers());
    }

    router.on("/*", not_found)
}

/// Handlers a routes file may name.
pub fn builtin_handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("home", home)
        .register("visits", visits)
        .register("session", session_info)
        .register("logout", logout)
        .register("echo", echo)
        .register("ping", |ctx: &mut Context<'_>, _: &Params| {
            ctx.reply().send_text("pong");
        })
        .register("not_found", not_found)
}

fn home(ctx: &mut Context<'_>, _: &Params) {
    ctx.reply().send_json(&json!({
        "service": "waypoint",
        "version": env!("CARGO_PKG_VERSION"),
    }));
}

fn visits(ctx: &mut Context<'_>, _: &Params) {
    let session = ctx.session();
    let count = session
        .get(["visits"])
        .and_then(Value::as_u64)
        .unwrap_or(0)
        + 1;
    session.set(["visits"], count);
    ctx.reply().send_json(&json!({ "visits": count }));
}

fn session_info(ctx: &mut Context<'_>, _: &Params) {
    let session = ctx.session();
    let body = json!({
        "linked": session.is_linked(),
        "timeout": session.timeout(),
        "rolling": session.is_rolling(),
        "start": session.start_time(),
        "end": session.end_time(),
    });
    ctx.reply().send_json(&body);
}

fn set_timeout(ctx: &mut Context<'_>, params: &Params) {
    match params.named("seconds").and_then(|s| s.parse::<i64>().ok()) {
        Some(seconds) => {
            ctx.session().set_timeout(seconds);
            session_info(ctx, params);
        }
        None => {
            let body = ErrorResponse::with_status(
                "invalid_request",
                "Timeout must be a whole number of seconds",
                StatusCode::BAD_REQUEST,
            );
            ctx.reply().status(StatusCode::BAD_REQUEST).send_json(&body);
        }
    }
}

fn logout(ctx: &mut Context<'_>, _: &Params) {
    ctx.session().destroy();
    ctx.redirect("/", true, false);
}

fn show_user(ctx: &mut Context<'_>, params: &Params) {
    ctx.reply()
        .send_json(&json!({ "id": params.named("id") }));
}

fn show_file(ctx: &mut Context<'_>, params: &Params) {
    ctx.reply().send_json(&json!({ "path": params.get(0) }));
}

fn echo(ctx: &mut Context<'_>, params: &Params) {
    let named: serde_json::Map<String, Value> = params
        .iter_named()
        .map(|(k, v)| (k.to_string(), Value::from(v)))
        .collect();
    let body = json!({
        "path": ctx.path(),
        "positional": params.positional(),
        "named": named,
    });
    ctx.reply().send_json(&body);
}

fn not_found(ctx: &mut Context<'_>, _: &Params) {
    let body = ErrorResponse::with_status(
        "not_found",
        format!("No route for {}", ctx.path()),
        StatusCode::NOT_FOUND,
    );
    ctx.reply().status(StatusCode::NOT_FOUND).send_json(&body);
}
