//! Specialization machinery of the Nyx compiler driver.
//!
//! A dynamically-typed call site is specialized in three steps: resolve the
//! typing rule and lowering implementation in the operation registry
//! (`nyx_codegen`), memoize the compiled entry point per argument-type
//! signature, and reuse it for every later call with the same signature.
//! This crate owns the memoization half:
//!
//! - [`HashKey`]: wraps a descriptor value to give it a total, consistent
//!   hash/equality contract — hash computed once and remembered (success or
//!   failure alike), equality delegating to the value with an identity
//!   fallback, the value owned for as long as the wrapper is reachable.
//! - [`SpecializationCache`]: the `(operation, argument types)` →
//!   [`CompiledSpecialization`] table with a single-flight miss path:
//!   concurrent misses on one key share a single compile.
//! - [`Dispatcher`]: the per-call-site control flow gluing registry and
//!   cache together.

mod cache;
mod dispatcher;
mod hashkey;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=nyx_dispatch=debug` or `RUST_LOG=nyx_dispatch=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

pub use cache::{
    CacheKey, CompileError, CompiledSpecialization, EntryPoint, SpecializationCache,
};
pub use dispatcher::{DescriptorInterner, Dispatcher};
pub use hashkey::HashKey;
