//! # Engine
//!
//! The native HTTP engine the adapter runs on: a radix-tree router, pooled
//! per-request contexts, a `before`/`after` middleware chain and a
//! `may_minihttp` front end.
//!
//! Routes use `:name` parameter segments. Handlers receive a
//! [`&mut dyn Ctx`](Ctx) that borrows pooled state for exactly one request
//! cycle; the state is reset and reused once the response has been written.
//!
//! ```rust,ignore
//! use brrtbridge::engine::{App, Ctx, EngineConfig};
//!
//! let app = App::new(EngineConfig::default());
//! app.get("/users/:id", |ctx| {
//!     let id = ctx.params("id").to_string();
//!     ctx.writer().write_all(id.as_bytes())?;
//!     Ok(())
//! });
//! let handle = app.listen("127.0.0.1:8080")?;
//! handle.join().ok();
//! ```
//!
//! [`App::test`] runs a request through the same dispatch path without a
//! socket, which is what the adapter's `serve_http` is built on.

mod app;
mod config;
mod ctx;
mod error;
mod http_server;
mod locals;
mod middleware;
mod multipart;
mod radix;

pub use app::{App, Group, Handler, Route, Router};
pub use config::{parse_size, EngineConfig, DEFAULT_BODY_LIMIT, DEFAULT_STACK_SIZE};
pub use ctx::{Ctx, DefaultCtx, NativeResponse, NativeState};
pub use error::Error;
pub use http_server::{
    interned_header_lines, AppService, HttpServer, ServerHandle, MAX_INTERNED_LINES,
    MAX_RESPONSE_HEADERS,
};
pub use locals::Locals;
pub use middleware::{Middleware, RequestIdMiddleware, TracingMiddleware};
pub use multipart::{parse_boundary, parse_form, FilePart, MultipartError, MultipartForm};
pub use radix::{ParamVec, RadixTree, MAX_INLINE_PARAMS};
