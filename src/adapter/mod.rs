//! # Adapter
//!
//! Runs [`api`](crate::api) operations on the [`engine`](crate::engine).
//!
//! Each registered operation becomes one engine route. Its `{name}` path
//! segments are rewritten to `:name`, and every call builds:
//!
//! - a [`BridgeContext`]: a fresh background context backed by a snapshot of
//!   the native locals present at dispatch;
//! - a [`Wrapper`]: the [`ApiContext`](crate::api::ApiContext) implementation
//!   over the native context.
//!
//! Both live only for the handler call. The native context is pooled and
//! recycled by the engine afterwards, and the borrow checker enforces that
//! neither outlives the call.
//!
//! [`BrrtAdapter`] also implements the synchronous entry point by running
//! requests through [`App::test`].

mod bridge;
mod harness;
mod router;
mod wrapper;

use std::sync::Arc;

pub use bridge::BridgeContext;
pub use router::rewrite_path;
pub use wrapper::Wrapper;

use crate::api::{Adapter, Operation, OperationHandler, ResponseWriter};
use crate::engine::{App, Router};

/// [`Adapter`] backed by an engine [`App`].
///
/// Routes are registered on `router` (the app or one of its groups), while
/// the synchronous entry point always runs through the whole app.
pub struct BrrtAdapter {
    tester: App,
    router: Box<dyn Router>,
}

impl BrrtAdapter {
    #[must_use]
    pub fn new(app: App) -> Self {
        Self {
            router: Box::new(app.clone()),
            tester: app,
        }
    }

    /// Register routes on `router` instead of the app root.
    #[must_use]
    pub fn with_router(app: App, router: impl Router + 'static) -> Self {
        Self {
            tester: app,
            router: Box::new(router),
        }
    }

    #[must_use]
    pub fn app(&self) -> &App {
        &self.tester
    }
}

impl Adapter for BrrtAdapter {
    fn handle(&self, op: Arc<Operation>, handler: OperationHandler) {
        self.register_operation(op, handler);
    }

    fn serve_http(&self, w: &mut dyn ResponseWriter, req: http::Request<Vec<u8>>) {
        self.serve(w, req);
    }
}
