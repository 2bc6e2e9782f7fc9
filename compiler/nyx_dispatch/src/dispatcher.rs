//! Call-site dispatch: type resolution, cache lookup, and compilation.
//!
//! `Dispatcher` ties the sealed operation registry to the specialization
//! cache. A call site hands it an operation and the argument descriptor
//! values; it resolves the typing rule, forms the cache key, and on a miss
//! runs the backend's emit callback under the cache's single-flight
//! contract.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use nyx_codegen::{LoweringFn, OpId, OperationRegistry};
use nyx_types::{signature, ArgTypes, Signature, TypeDesc, TypeLike};

use crate::cache::{
    CacheKey, CompileError, CompiledSpecialization, EntryPoint, SpecializationCache,
};

/// Canonical descriptor values for the built-in types.
///
/// Cache keys own their components, so correctness never depends on the
/// interner; it exists to stop every call site from allocating a fresh
/// `Arc<TypeDesc>` per call. One long-lived `Arc` per descriptor, shared
/// by every key formed through it.
#[derive(Default)]
pub struct DescriptorInterner {
    map: RwLock<FxHashMap<TypeDesc, Arc<dyn TypeLike>>>,
}

impl DescriptorInterner {
    pub fn new() -> Self {
        DescriptorInterner::default()
    }

    /// The canonical value for `desc`, allocating it on first sight.
    pub fn intern(&self, desc: TypeDesc) -> Arc<dyn TypeLike> {
        if let Some(value) = self.map.read().get(&desc) {
            return Arc::clone(value);
        }
        let mut map = self.map.write();
        Arc::clone(
            map.entry(desc)
                .or_insert_with(|| Arc::new(desc) as Arc<dyn TypeLike>),
        )
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

/// One dispatcher per sealed registry; shared across call sites.
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    cache: SpecializationCache,
    interner: DescriptorInterner,
}

impl Dispatcher {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Dispatcher {
            registry,
            cache: SpecializationCache::new(),
            interner: DescriptorInterner::new(),
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &SpecializationCache {
        &self.cache
    }

    /// Canonical descriptor value for `desc`, suitable for cache keys.
    pub fn descriptor(&self, desc: TypeDesc) -> Arc<dyn TypeLike> {
        self.interner.intern(desc)
    }

    /// Resolve and, if needed, compile the specialization of `op` for the
    /// given argument values.
    ///
    /// Typing runs before the cache is consulted, so a call that the
    /// registry rejects never occupies a slot. On a miss, `emit` receives
    /// the resolved lowering and the full signature and must return the
    /// finished entry point; the cache guarantees it runs at most once per
    /// key across threads.
    #[tracing::instrument(level = "trace", skip(self, args, emit))]
    pub fn specialize<F>(
        &self,
        op: OpId,
        args: &[Arc<dyn TypeLike>],
        emit: F,
    ) -> Result<Arc<CompiledSpecialization>, CompileError>
    where
        F: FnOnce(&LoweringFn, &Signature) -> EntryPoint,
    {
        let mut descs = ArgTypes::new();
        for arg in args {
            let desc = arg.descriptor().ok_or_else(|| CompileError::UnknownType {
                name: arg.type_name(),
            })?;
            descs.push(desc);
        }

        let result = self.registry.resolve_typing(op, &descs)?;
        let key = CacheKey::new(op, args)?;

        self.cache.get_or_compile(key, || {
            let lowering = self.registry.resolve_lowering(op, &descs)?;
            let sig = signature(result, &descs);
            let entry = emit(&lowering, &sig);
            tracing::debug!(
                op = %self.registry.op_name(op),
                sig = %sig,
                entry = entry.0,
                "compiled specialization"
            );
            Ok((entry, result))
        })
    }
}

#[cfg(test)]
mod tests;
