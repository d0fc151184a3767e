//! # brrtbridge
//!
//! Runs an engine-independent HTTP API layer on top of a pooled,
//! coroutine-powered HTTP engine.
//!
//! ## Architecture
//!
//! - **[`api`]** - The framework contract: [`Operation`](api::Operation),
//!   [`ApiContext`](api::ApiContext), [`Adapter`](api::Adapter), [`Api`](api::Api)
//! - **[`engine`]** - The HTTP engine: radix routing, pooled per-request
//!   state, middleware, in-process testing and a `may_minihttp` front end
//! - **[`adapter`]** - The bridge between the two: path rewriting, the
//!   per-request [`Wrapper`](adapter::Wrapper) and
//!   [`BridgeContext`](adapter::BridgeContext), synchronous `serve_http`
//! - **[`context`]** - Cancellable, deadline-aware contexts with values
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ## Request flow
//!
//! ```text
//! engine router ──> adapter route handler
//!                     ├─ snapshot native locals ─> BridgeContext
//!                     ├─ borrow native Ctx      ─> Wrapper
//!                     └─ operation handler(&mut Wrapper)
//!                                 └─ reads/writes land on the native Ctx
//! ```
//!
//! The native context is pooled and reset after every request. The
//! [`Wrapper`](adapter::Wrapper) borrows it for the handler call only, so a
//! handler cannot keep it (or anything borrowed from it) alive past its return.
//!
//! ## Quick start
//!
//! ```rust
//! use brrtbridge::api::{Config, Operation, ResponseRecorder};
//! use brrtbridge::engine::{App, EngineConfig};
//! use http::Method;
//! use std::io::Write;
//!
//! let app = App::new(EngineConfig::default());
//! let api = brrtbridge::new(&app, Config::new("Items", "1.0.0"));
//!
//! api.register(Operation::new(Method::GET, "/items/{id}"), |ctx| {
//!     let body = format!("item {}", ctx.param("id"));
//!     ctx.set_status(200);
//!     ctx.set_header("Content-Type", "text/plain");
//!     let _ = ctx.body_writer().write_all(body.as_bytes());
//! });
//!
//! let mut rec = ResponseRecorder::new();
//! api.serve_http(&mut rec, http::Request::get("/items/42").body(Vec::new()).unwrap());
//! assert_eq!(rec.body(), b"item 42");
//! ```
//!
//! To serve over the network instead, call [`App::listen`](engine::App::listen).

pub mod adapter;
pub mod api;
pub mod context;
pub mod engine;
pub mod ids;
pub mod logging;

pub use adapter::BrrtAdapter;
pub use ids::RequestId;

use api::{ApiContext, Api, Config};
use engine::{App, Ctx, Group};

/// Create an API whose operations are routed by `app`.
#[must_use]
pub fn new(app: &App, config: Config) -> Api {
    Api::new(config, Box::new(BrrtAdapter::new(app.clone())))
}

/// Create an API whose operations are mounted on `group`.
///
/// Requests made through [`Api::serve_http`] still go through the whole `app`.
#[must_use]
pub fn new_with_group(app: &App, group: &Group, config: Config) -> Api {
    Api::new(
        config,
        Box::new(BrrtAdapter::with_router(app.clone(), group.clone())),
    )
}

/// Native engine context behind an [`ApiContext`] built by this crate.
///
/// Keep in mind that the native context is pooled: do not keep references to
/// it or its values past the handler's return.
///
/// # Panics
///
/// If `ctx` was not built by this crate's adapter.
#[allow(clippy::panic)]
pub fn unwrap(ctx: &mut dyn ApiContext) -> &mut dyn Ctx {
    match ctx.native_ctx() {
        Some(native) => native,
        None => panic!("not a brrtbridge context"),
    }
}
