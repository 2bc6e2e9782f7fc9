//! The specialization cache.
//!
//! Memoizes `(operation identity, argument-type signature)` →
//! compiled native entry point for the life of the process; there is no
//! eviction. The miss path is single-flight: concurrent requests for the
//! same key elect one leader to run the compile while the rest block on a
//! per-key condvar, and every caller observes the leader's result.
//! Distinct keys never contend beyond map sharding.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxBuildHasher, FxHasher};
use smallvec::SmallVec;

use nyx_codegen::{OpId, ResolveError};
use nyx_types::{HashFailure, TypeDesc, TypeLike};

use crate::hashkey::HashKey;

/// Address of a compiled native entry point. Opaque to this crate; the
/// backend that emitted the code knows how to call it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct EntryPoint(pub u64);

/// Failure of a call-site compilation, surfaced as a diagnostic for the
/// offending call site.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum CompileError {
    /// A cache-key component's hash failed.
    Hash(HashFailure),
    /// Typing or lowering resolution failed.
    Resolve(ResolveError),
    /// An argument's descriptor value does not map into the compiler's
    /// type space.
    UnknownType { name: String },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Hash(err) => write!(f, "{err}"),
            CompileError::Resolve(err) => write!(f, "{err}"),
            CompileError::UnknownType { name } => {
                write!(f, "descriptor `{name}` does not denote a compiler type")
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Hash(err) => Some(err),
            CompileError::Resolve(err) => Some(err),
            CompileError::UnknownType { .. } => None,
        }
    }
}

impl From<HashFailure> for CompileError {
    fn from(err: HashFailure) -> Self {
        CompileError::Hash(err)
    }
}

impl From<ResolveError> for CompileError {
    fn from(err: ResolveError) -> Self {
        CompileError::Resolve(err)
    }
}

/// Cache key: operation identity plus the ordered argument-type tuple,
/// each component wrapped through [`HashKey`]. The combined hash is fixed
/// at construction, so a key whose components would fail to hash cannot be
/// built — the failure surfaces as a [`CompileError::Hash`] instead.
#[derive(Clone, Debug)]
pub struct CacheKey {
    op: OpId,
    args: SmallVec<[HashKey; 4]>,
    hash: u64,
}

impl CacheKey {
    /// Build a key from descriptor values, wrapping each and resolving
    /// each wrapper's hash eagerly.
    pub fn new(op: OpId, args: &[Arc<dyn TypeLike>]) -> Result<CacheKey, HashFailure> {
        let args: SmallVec<[HashKey; 4]> = args.iter().map(HashKey::wrap).collect();
        let mut hasher = FxHasher::default();
        op.index().hash(&mut hasher);
        for key in &args {
            key.hash_value()?.hash(&mut hasher);
        }
        Ok(CacheKey {
            op,
            args,
            hash: hasher.finish(),
        })
    }

    pub fn op(&self) -> OpId {
        self.op
    }

    pub fn args(&self) -> &[HashKey] {
        &self.args
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &CacheKey) -> bool {
        self.op == other.op && self.args == other.args
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// A compiled specialization: one native entry point valid for exactly one
/// `(operation, type signature)` pair. Immutable; reused for every later
/// call with an equal key; never evicted.
#[derive(Debug)]
pub struct CompiledSpecialization {
    key: CacheKey,
    entry: EntryPoint,
    result: TypeDesc,
}

impl CompiledSpecialization {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn entry(&self) -> EntryPoint {
        self.entry
    }

    pub fn result(&self) -> TypeDesc {
        self.result
    }
}

enum SlotState {
    Building,
    Ready(Arc<CompiledSpecialization>),
    Failed(CompileError),
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn new() -> Self {
        Slot {
            state: Mutex::new(SlotState::Building),
            ready: Condvar::new(),
        }
    }
}

/// Process-lifetime cache of compiled specializations.
#[derive(Default)]
pub struct SpecializationCache {
    slots: DashMap<CacheKey, Arc<Slot>, FxBuildHasher>,
}

impl SpecializationCache {
    pub fn new() -> Self {
        SpecializationCache::default()
    }

    /// Completed entries (in-flight compiles are not counted).
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(*entry.value().state.lock(), SlotState::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Peek at a completed specialization without compiling.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CompiledSpecialization>> {
        let slot = Arc::clone(self.slots.get(key)?.value());
        let state = slot.state.lock();
        match &*state {
            SlotState::Ready(spec) => Some(Arc::clone(spec)),
            _ => None,
        }
    }

    /// Return the specialization for `key`, compiling it with `compile` on
    /// a miss.
    ///
    /// At most one compile runs per key: concurrent misses block
    /// cooperatively until the leader finishes, then share its result. A
    /// failed compile is reported to every caller that joined it and the
    /// slot is cleared so a later call may retry.
    pub fn get_or_compile<F>(
        &self,
        key: CacheKey,
        compile: F,
    ) -> Result<Arc<CompiledSpecialization>, CompileError>
    where
        F: FnOnce() -> Result<(EntryPoint, TypeDesc), CompileError>,
    {
        let (slot, leader) = match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let slot = Arc::new(Slot::new());
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        };

        if leader {
            // The shard guard is released; compilation runs unlocked so
            // other keys proceed in parallel.
            tracing::debug!(op = key.op().index(), "cache miss, compiling");
            match compile() {
                Ok((entry, result)) => {
                    let spec = Arc::new(CompiledSpecialization {
                        key,
                        entry,
                        result,
                    });
                    let mut state = slot.state.lock();
                    *state = SlotState::Ready(Arc::clone(&spec));
                    drop(state);
                    slot.ready.notify_all();
                    Ok(spec)
                }
                Err(err) => {
                    let mut state = slot.state.lock();
                    *state = SlotState::Failed(err.clone());
                    drop(state);
                    slot.ready.notify_all();
                    // Clear the slot; a later call may retry the compile.
                    self.slots.remove(&key);
                    Err(err)
                }
            }
        } else {
            let mut state = slot.state.lock();
            while matches!(*state, SlotState::Building) {
                slot.ready.wait(&mut state);
            }
            match &*state {
                SlotState::Ready(spec) => {
                    tracing::trace!(op = key.op().index(), "cache hit");
                    Ok(Arc::clone(spec))
                }
                SlotState::Failed(err) => Err(err.clone()),
                SlotState::Building => unreachable!("woken while still building"),
            }
        }
    }
}
