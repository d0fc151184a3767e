use std::sync::Arc;
use std::time::Instant;

use crate::context::{Context, Key, Value};

/// Context handed to operation handlers.
///
/// Answers from the wrapped standard context first, then from a snapshot of
/// the engine's native locals taken when the request was dispatched. Locals
/// set on the native context after that point are not visible here.
pub struct BridgeContext {
    inner: Arc<dyn Context>,
    values: Vec<(Key, Value)>,
}

impl BridgeContext {
    #[must_use]
    pub fn new(inner: Arc<dyn Context>, values: Vec<(Key, Value)>) -> Self {
        Self { inner, values }
    }

    /// Number of native locals captured at dispatch.
    #[must_use]
    pub fn snapshot_len(&self) -> usize {
        self.values.len()
    }
}

impl Context for BridgeContext {
    fn value(&self, key: &Key) -> Option<Value> {
        if let Some(value) = self.inner.value(key) {
            return Some(value);
        }
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| Arc::clone(v))
    }

    fn deadline(&self) -> Option<Instant> {
        self.inner.deadline()
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}
