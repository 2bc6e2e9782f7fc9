//! Type system surface of the Nyx specialization core.
//!
//! This crate defines the vocabulary shared by the operation registry, the
//! specialization cache, and the lowering implementations:
//!
//! - [`TypeDesc`]: a closed tagged variant identifying a type structurally.
//!   Two descriptors describing the same type compare equal and hash
//!   identically regardless of which call site produced them.
//! - [`TypeCategory`]: pattern categories ("any integer", "any float", plus
//!   registered user predicates) used when a lowering implementation is
//!   registered for a family of types rather than one exact tuple.
//! - [`Signature`]: an ordered parameter-type tuple plus a result type.
//! - [`TypeLike`]: the dynamic seam through which user-extended descriptor
//!   values (whose native hash or equality may be absent or unreliable)
//!   enter cache keys.

mod category;
mod descriptor;
mod dynamic;
mod signature;

pub use category::{CategoryId, CategoryPredicate, CategoryTable, TypeCategory};
pub use descriptor::{ExtensionId, FloatWidth, IntWidth, OpaqueId, Signedness, TypeDesc};
pub use dynamic::{HashFailure, TypeLike};
pub use signature::{signature, ArgTypes, Signature};
