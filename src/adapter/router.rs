use std::sync::Arc;

use tracing::debug;

use super::bridge::BridgeContext;
use super::wrapper::Wrapper;
use super::BrrtAdapter;
use crate::api::{Operation, OperationHandler};
use crate::context::{self, Context, Key, Value};
use crate::engine::{Ctx, Error, Handler};

/// Convert `{name}` path segments to the engine's `:name` syntax.
///
/// Purely syntactic: braces are swapped and dropped, names are not validated.
#[must_use]
pub fn rewrite_path(path: &str) -> String {
    path.replace('{', ":").replace('}', "")
}

impl BrrtAdapter {
    pub(crate) fn register_operation(&self, op: Arc<Operation>, handler: OperationHandler) {
        let path = rewrite_path(&op.path);
        let method = op.method.clone();
        debug!(method = %method, from = %op.path, to = %path, "Registering operation route");

        let route: Handler = Arc::new(move |ctx: &mut dyn Ctx| -> Result<(), Error> {
            let mut values: Vec<(Key, Value)> = Vec::new();
            ctx.visit_locals(&mut |key, value| values.push((key.clone(), Arc::clone(value))));
            let bridge: Arc<dyn Context> =
                Arc::new(BridgeContext::new(context::background(), values));

            let mut wrapper = Wrapper::new(Arc::clone(&op), ctx, bridge);
            handler(&mut wrapper);
            Ok(())
        });
        self.router.add(&[method], &path, route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_path() {
        assert_eq!(rewrite_path("/items/{id}"), "/items/:id");
        assert_eq!(
            rewrite_path("/users/{user_id}/posts/{post_id}"),
            "/users/:user_id/posts/:post_id"
        );
        assert_eq!(rewrite_path("/static"), "/static");
        assert_eq!(rewrite_path("/odd/{a-b}"), "/odd/:a-b");
    }
}
