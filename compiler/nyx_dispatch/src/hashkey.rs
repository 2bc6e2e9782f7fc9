//! The cached-hash wrapper for cache-key components.
//!
//! Descriptor values used in cache keys may come from user extensions whose
//! native hash is expensive, absent, or failing, and whose equality is
//! partial. `HashKey` absorbs all of that behind a total contract:
//!
//! - The hash is computed at most once. The first outcome — a value or a
//!   [`HashFailure`] — is cached and replayed identically on every later
//!   attempt; the wrapped value is never re-consulted.
//! - Equality delegates to the wrapped value's own equality and falls back
//!   to identity when the values cannot be compared.
//! - Wrapping is idempotent: wrapping a wrapper yields a handle to the
//!   same underlying wrapper state, never a double wrap.
//! - The wrapper owns the value: it stays alive exactly as long as a
//!   wrapper (or another strong holder) is reachable, so a cache key keeps
//!   its components hashable and comparable for the life of the cache
//!   entry regardless of what the call site does with its own handle.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use nyx_types::{HashFailure, TypeDesc, TypeLike};

struct KeyInner {
    target: Arc<dyn TypeLike>,
    cached: OnceLock<Result<u64, HashFailure>>,
}

/// Wrapper giving an arbitrary descriptor value stable hash/equality
/// semantics. Cheap to clone; clones share the cached hash state.
#[derive(Clone)]
pub struct HashKey {
    inner: Arc<KeyInner>,
}

impl HashKey {
    /// Wrap a descriptor value. Total: never fails, whatever the value's
    /// own hash/equality behavior. Wrapping an existing wrapper returns a
    /// handle to the same wrapper state.
    pub fn wrap(value: &Arc<dyn TypeLike>) -> HashKey {
        if let Some(existing) = value.as_any().downcast_ref::<HashKey>() {
            return existing.clone();
        }
        HashKey {
            inner: Arc::new(KeyInner {
                target: Arc::clone(value),
                cached: OnceLock::new(),
            }),
        }
    }

    /// The wrapped value's hash, computed on first call and replayed —
    /// success or failure — on every later call.
    pub fn hash_value(&self) -> Result<u64, HashFailure> {
        self.inner
            .cached
            .get_or_init(|| self.inner.target.type_hash())
            .clone()
    }

    /// The wrapped value.
    pub fn target(&self) -> &Arc<dyn TypeLike> {
        &self.inner.target
    }

    /// Do two keys share the same wrapper state (idempotent-wrap check)?
    pub fn same_wrapper(&self, other: &HashKey) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &HashKey) -> bool {
        if self.same_wrapper(other) {
            return true;
        }
        // The values' own equality decides; identity is the fallback when
        // the pair is incomparable.
        self.inner
            .target
            .type_eq(other.inner.target.as_ref())
            .unwrap_or_else(|| Arc::ptr_eq(&self.inner.target, &other.inner.target))
    }
}

impl Eq for HashKey {}

impl std::fmt::Debug for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashKey")
            .field("name", &self.inner.target.type_name())
            .field("hashed", &self.inner.cached.get().is_some())
            .finish()
    }
}

// A wrapper is itself a descriptor value, which is what makes `wrap`
// idempotent through `Arc<dyn TypeLike>`.
impl TypeLike for HashKey {
    fn type_hash(&self) -> Result<u64, HashFailure> {
        self.hash_value()
    }

    fn type_eq(&self, other: &dyn TypeLike) -> Option<bool> {
        if let Some(other) = other.as_any().downcast_ref::<HashKey>() {
            return Some(self == other);
        }
        self.inner.target.type_eq(other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> String {
        self.inner.target.type_name()
    }

    fn descriptor(&self) -> Option<TypeDesc> {
        self.inner.target.descriptor()
    }
}

#[cfg(test)]
mod tests;
