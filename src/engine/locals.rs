use crate::context::{Key, Value};
use smallvec::SmallVec;

/// Most requests carry only a handful of locals (request id, auth subject).
const INLINE_LOCALS: usize = 8;

/// The engine's per-request key/value store.
///
/// Entries keep insertion order. Setting an existing key replaces its value in
/// place, so iteration order is the order keys were first set. The store is
/// part of the pooled request state and is cleared, not dropped, between
/// requests.
#[derive(Default)]
pub struct Locals {
    entries: SmallVec<[(Key, Value); INLINE_LOCALS]>,
}

impl Locals {
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: Key, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Visit every entry in insertion order.
    pub fn visit(&self, f: &mut dyn FnMut(&Key, &Value)) {
        for (k, v) in &self.entries {
            f(k, v);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
