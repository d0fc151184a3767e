use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use super::context::ApiContext;
use super::operation::Operation;
use super::writer::ResponseWriter;

/// Handler the framework registers for one operation.
pub type OperationHandler = Arc<dyn Fn(&mut dyn ApiContext) + Send + Sync>;

/// Connects the framework to an HTTP engine.
pub trait Adapter: Send + Sync {
    /// Route requests for `op` to `handler`.
    fn handle(&self, op: Arc<Operation>, handler: OperationHandler);

    /// Serve one request synchronously through everything registered so far.
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: http::Request<Vec<u8>>);
}

/// API metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub title: String,
    pub version: String,
}

impl Config {
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
        }
    }
}

/// An API: its configuration, its adapter and the operations registered on it.
pub struct Api {
    config: Config,
    adapter: Box<dyn Adapter>,
    operations: RwLock<Vec<Arc<Operation>>>,
}

impl Api {
    #[must_use]
    pub fn new(config: Config, adapter: Box<dyn Adapter>) -> Self {
        Self {
            config,
            adapter,
            operations: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    /// Register `handler` for `op`.
    pub fn register<F>(&self, op: Operation, handler: F)
    where
        F: Fn(&mut dyn ApiContext) + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        info!(
            api = %self.config.title,
            operation_id = %op.operation_id,
            method = %op.method,
            path = %op.path,
            "Operation registered"
        );
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&op));
        self.adapter.handle(op, Arc::new(handler));
    }

    /// Operations in registration order.
    #[must_use]
    pub fn operations(&self) -> Vec<Arc<Operation>> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn serve_http(&self, w: &mut dyn ResponseWriter, req: http::Request<Vec<u8>>) {
        self.adapter.serve_http(w, req);
    }
}
