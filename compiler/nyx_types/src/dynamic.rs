//! Dynamic descriptor values.
//!
//! Cache keys are built from descriptor *values*, and user extensions may
//! supply descriptors whose native hash is expensive, absent, or outright
//! failing, and whose equality is partial (undefined across unrelated
//! extension kinds). `TypeLike` is the object-safe seam those values pass
//! through; the wrapper in `nyx_dispatch` absorbs the unreliable parts.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::TypeDesc;

/// A failure raised by a descriptor's native hash computation.
///
/// Captured once by the hash wrapper and replayed identically on every
/// later hash attempt.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct HashFailure {
    message: Arc<str>,
}

impl HashFailure {
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        HashFailure {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HashFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "descriptor hash failed: {}", self.message)
    }
}

impl std::error::Error for HashFailure {}

/// A descriptor value usable as a cache-key component.
///
/// `type_eq` returns `None` when equality is undefined for the pair (the
/// caller falls back to identity). `type_hash` may fail; callers must not
/// assume it is retryable.
pub trait TypeLike: Any + Send + Sync {
    /// Native hash of the descriptor value.
    fn type_hash(&self) -> Result<u64, HashFailure>;

    /// Native equality against another descriptor value, or `None` if the
    /// comparison is undefined for this pair.
    fn type_eq(&self, other: &dyn TypeLike) -> Option<bool>;

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Human-readable name, for diagnostics.
    fn type_name(&self) -> String;

    /// The structural descriptor this value denotes, if it maps into the
    /// closed descriptor space (extension values usually report a
    /// `TypeDesc::Extension`).
    fn descriptor(&self) -> Option<TypeDesc>;
}

impl TypeLike for TypeDesc {
    fn type_hash(&self) -> Result<u64, HashFailure> {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        Ok(hasher.finish())
    }

    fn type_eq(&self, other: &dyn TypeLike) -> Option<bool> {
        other
            .as_any()
            .downcast_ref::<TypeDesc>()
            .map(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> String {
        self.to_string()
    }

    fn descriptor(&self) -> Option<TypeDesc> {
        Some(*self)
    }
}
