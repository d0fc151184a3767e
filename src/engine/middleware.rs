use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::ctx::Ctx;
use crate::context::Key;
use crate::ids::RequestId;

/// Hook run around every request the engine dispatches.
///
/// `before` runs after route lookup and before the route handler, in
/// registration order. Returning `ControlFlow::Break` skips the handler (and
/// any later `before` hooks); whatever the middleware wrote to the context is
/// the response. `after` always runs, for every middleware, once the response
/// is final.
pub trait Middleware: Send + Sync {
    fn before(&self, _ctx: &mut dyn Ctx) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
    fn after(&self, _ctx: &mut dyn Ctx, _latency: Duration) {}
}

/// Tags every request with a [`RequestId`].
///
/// The id is stored in the native locals under `Key::of::<RequestId>()` and
/// echoed in the configured request id header. A valid inbound id is reused.
pub struct RequestIdMiddleware;

impl Middleware for RequestIdMiddleware {
    fn before(&self, ctx: &mut dyn Ctx) -> ControlFlow<()> {
        let header = ctx.app().request_id_header.clone();
        let id = RequestId::from_header_or_new(Some(ctx.get(&header)));
        ctx.set_locals(Key::of::<RequestId>(), Arc::new(id));
        ctx.set(&header, &id.to_string());
        ControlFlow::Continue(())
    }
}

/// Logs request start and completion.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, ctx: &mut dyn Ctx) -> ControlFlow<()> {
        debug!(
            method = %ctx.method(),
            path = %ctx.path(),
            route = %ctx.route_path(),
            "Request started"
        );
        ControlFlow::Continue(())
    }

    fn after(&self, ctx: &mut dyn Ctx, latency: Duration) {
        info!(
            method = %ctx.method(),
            path = %ctx.path(),
            route = %ctx.route_path(),
            status = ctx.response_status(),
            latency_ms = latency.as_millis() as u64,
            "Request completed"
        );
    }
}
