//! Radix tree route table for the engine.
//!
//! Paths are split on `/` and each segment becomes a node:
//! - Static segments (e.g., `users`) match exactly
//! - Parameter segments (e.g., `:id`) match any single segment and capture it
//! - Routes are stored at terminal nodes, keyed by HTTP method
//!
//! Lookup is O(k) in the number of path segments. Static children are tried
//! before parameter children, and a failed parameter branch backtracks.
//!
//! ```rust,ignore
//! let mut tree = RadixTree::default();
//! tree.insert(Method::GET, "/users/:id", Arc::new("get_user"));
//!
//! let mut params = ParamVec::new();
//! let route = tree.lookup(&Method::GET, "/users/123", &mut params);
//! assert_eq!(params[0].1, "123");
//! ```

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum path parameters held inline before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured path parameters in path order.
///
/// Parameter names are `Arc<str>` shared with the tree, so capturing costs one
/// atomic increment per name.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

struct RadixNode<T> {
    segment: String,
    /// Routes terminating at this node, per method
    routes: HashMap<Method, Arc<T>>,
    /// Set when this node captures a `:name` segment
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode<T>>,
    /// One child per distinct parameter name at this position, so
    /// `/users/:user_id/posts` and `/users/:id/comments` capture their own names
    param_children: Vec<RadixNode<T>>,
}

impl<T> RadixNode<T> {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            routes: HashMap::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    fn new_param(name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(name)),
            ..Self::new("")
        }
    }

    /// Returns the route previously stored for `method` at this path, if any.
    fn insert(&mut self, segments: &[&str], method: Method, route: Arc<T>) -> Option<Arc<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, route);
        };

        if let Some(name) = segment.strip_prefix(':') {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(name))
            {
                return child.insert(remaining, method, route);
            }
            let mut child = RadixNode::new_param(name);
            let replaced = child.insert(remaining, method, route);
            self.param_children.push(child);
            return replaced;
        }

        if let Some(child) = self.children.iter_mut().find(|c| c.segment == *segment) {
            return child.insert(remaining, method, route);
        }
        let mut child = RadixNode::new(segment);
        let replaced = child.insert(remaining, method, route);
        self.children.push(child);
        replaced
    }

    fn search(&self, segments: &[&str], method: &Method, params: &mut ParamVec) -> Option<Arc<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.get(method).cloned();
        };

        for child in &self.children {
            if child.segment == *segment {
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
                params.pop();
            }
        }

        None
    }
}

/// Method + path route table using `:name` parameter segments.
pub struct RadixTree<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> Default for RadixTree<T> {
    fn default() -> Self {
        Self {
            root: RadixNode::new(""),
            len: 0,
        }
    }
}

impl<T> RadixTree<T> {
    /// Store `route` for `method` at `path`. Re-registering the same method and
    /// path replaces the earlier route and returns it.
    pub fn insert(&mut self, method: Method, path: &str, route: Arc<T>) -> Option<Arc<T>> {
        let segments = split_path(path);
        let replaced = self.root.insert(&segments, method, route);
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Find the route for `method` and `path`, appending captured parameters to `params`.
    pub fn lookup(&self, method: &Method, path: &str, params: &mut ParamVec) -> Option<Arc<T>> {
        let segments = split_path(path);
        self.root.search(&segments, method, params)
    }

    /// Number of method + path pairs registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn split_path(path: &str) -> SmallVec<[&str; 16]> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
