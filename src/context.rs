//! # Context Module
//!
//! A cancellable, deadline-aware context that carries request-scoped values.
//!
//! Contexts form a chain: every derived context ([`with_value`], [`with_cancel`],
//! [`with_deadline`]) answers from its own slot first and then defers to its
//! parent. The root of every chain is [`background()`], which is never cancelled,
//! has no deadline and carries no values.
//!
//! ## Keys
//!
//! Lookups use raw [`Key`] equality. A [`Key::of`] key is identified by the
//! `TypeId` of its marker type, so two modules can never collide by accident.
//! A [`Key::name`] key compares by its string, and never equals a type key even
//! when the names happen to match.
//!
//! ```rust
//! use brrtbridge::context::{self, Context, Key};
//! use std::sync::Arc;
//!
//! struct TenantKey;
//!
//! let root = context::background();
//! let ctx = context::with_value(root, Key::of::<TenantKey>(), Arc::new("acme".to_string()));
//! let tenant = ctx.value(&Key::of::<TenantKey>()).unwrap();
//! assert_eq!(context::value_as::<String>(&tenant).map(String::as_str), Some("acme"));
//! ```

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Value stored against a [`Key`].
pub type Value = Arc<dyn Any + Send + Sync>;

/// Downcast a stored [`Value`] to a concrete type.
#[must_use]
pub fn value_as<T: Any>(value: &Value) -> Option<&T> {
    value.downcast_ref::<T>()
}

/// Identity of a context value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// String key, compared by content.
    Name(Cow<'static, str>),
    /// Type handle, compared by `TypeId`. The name is kept for diagnostics only.
    Type(TypeId, &'static str),
}

impl Key {
    /// Key identified by a marker type.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Key identified by a string.
    #[must_use]
    pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
        Key::Name(name.into())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "Key({name:?})"),
            Key::Type(_, type_name) => write!(f, "Key(<{type_name}>)"),
        }
    }
}

/// Cancellable context carrying request-scoped values.
pub trait Context: Send + Sync {
    /// Look up the value stored under `key`, searching up the chain.
    fn value(&self, key: &Key) -> Option<Value>;

    /// Instant after which work on behalf of this context should stop.
    fn deadline(&self) -> Option<Instant> {
        None
    }

    /// Whether this context (or an ancestor) has been cancelled.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// The empty root context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Background;

impl Context for Background {
    fn value(&self, _key: &Key) -> Option<Value> {
        None
    }
}

/// Returns a fresh, never-cancelled root context.
#[must_use]
pub fn background() -> Arc<dyn Context> {
    Arc::new(Background)
}

/// Context carrying one extra key/value pair.
pub struct WithValue {
    parent: Arc<dyn Context>,
    key: Key,
    value: Value,
}

impl Context for WithValue {
    fn value(&self, key: &Key) -> Option<Value> {
        if &self.key == key {
            return Some(Arc::clone(&self.value));
        }
        self.parent.value(key)
    }

    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn is_cancelled(&self) -> bool {
        self.parent.is_cancelled()
    }
}

/// Derive a context that additionally maps `key` to `value`.
#[must_use]
pub fn with_value(parent: Arc<dyn Context>, key: Key, value: Value) -> Arc<dyn Context> {
    Arc::new(WithValue { parent, key, value })
}

/// Context that can be cancelled through its [`CancelHandle`].
pub struct WithCancel {
    parent: Arc<dyn Context>,
    cancelled: Arc<AtomicBool>,
}

impl Context for WithCancel {
    fn value(&self, key: &Key) -> Option<Value> {
        self.parent.value(key)
    }

    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.parent.is_cancelled()
    }
}

/// Cancels the [`WithCancel`] context it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Mark the context as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Derive a cancellable context.
#[must_use]
pub fn with_cancel(parent: Arc<dyn Context>) -> (Arc<dyn Context>, CancelHandle) {
    let cancelled = Arc::new(AtomicBool::new(false));
    let ctx = WithCancel {
        parent,
        cancelled: Arc::clone(&cancelled),
    };
    (Arc::new(ctx), CancelHandle { cancelled })
}

/// Context bounded by a deadline.
pub struct WithDeadline {
    parent: Arc<dyn Context>,
    deadline: Instant,
}

impl Context for WithDeadline {
    fn value(&self, key: &Key) -> Option<Value> {
        self.parent.value(key)
    }

    fn deadline(&self) -> Option<Instant> {
        match self.parent.deadline() {
            Some(parent) if parent < self.deadline => Some(parent),
            _ => Some(self.deadline),
        }
    }

    fn is_cancelled(&self) -> bool {
        Instant::now() >= self.deadline || self.parent.is_cancelled()
    }
}

/// Derive a context that is cancelled once `deadline` passes.
#[must_use]
pub fn with_deadline(parent: Arc<dyn Context>, deadline: Instant) -> Arc<dyn Context> {
    Arc::new(WithDeadline { parent, deadline })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Marker;

    #[test]
    fn test_name_and_type_keys_never_collide() {
        let ctx = with_value(background(), Key::name("Marker"), Arc::new(1u32));
        assert!(ctx.value(&Key::of::<Marker>()).is_none());
        assert!(ctx.value(&Key::name("Marker")).is_some());
    }

    #[test]
    fn test_child_value_shadows_parent() {
        let parent = with_value(background(), Key::name("k"), Arc::new(1u32));
        let child = with_value(parent, Key::name("k"), Arc::new(2u32));
        let v = child.value(&Key::name("k")).unwrap();
        assert_eq!(value_as::<u32>(&v), Some(&2));
    }

    #[test]
    fn test_cancel_propagates_to_children_only() {
        let (parent, handle) = with_cancel(background());
        let child = with_value(Arc::clone(&parent), Key::name("k"), Arc::new(()));
        assert!(!child.is_cancelled());
        handle.cancel();
        assert!(parent.is_cancelled());
        assert!(child.is_cancelled());

        let (_other, other_handle) = with_cancel(background());
        other_handle.cancel();
        assert!(!background().is_cancelled());
    }

    #[test]
    fn test_deadline_keeps_earliest() {
        let soon = Instant::now() + Duration::from_secs(5);
        let later = soon + Duration::from_secs(60);
        let outer = with_deadline(background(), soon);
        let inner = with_deadline(outer, later);
        assert_eq!(inner.deadline(), Some(soon));
        assert!(!inner.is_cancelled());

        let expired = with_deadline(background(), Instant::now());
        assert!(expired.is_cancelled());
    }
}
