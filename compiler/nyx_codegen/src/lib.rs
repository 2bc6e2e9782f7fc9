//! Code-generation core of the Nyx specializer.
//!
//! Three pieces live here:
//!
//! - [`OperationRegistry`]: the process-wide table mapping an operation
//!   identity to its typing rule and its lowering implementations. The
//!   registry has a two-phase lifecycle: an open registration phase driven
//!   through [`RegistryBuilder`] (single-threaded, append-only), sealed
//!   into a read-only registry safe for concurrent resolution.
//! - [`NativeBuilder`]: the interface of the opaque code-generation
//!   collaborator. Lowerings orchestrate calls against it; they own no
//!   instruction-encoding logic themselves.
//! - The canonical lowerings: the fixed-width range iterator
//!   ([`register_range_ops`]) and the builtin integer operator tables
//!   ([`register_int_ops`]).
//!
//! The [`tape`] module provides a reference backend that records emitted
//! instructions on a linear tape and executes them with two's-complement
//! semantics; it exists so lowered code can be run without a native target.
//!
//! # Debug Environment Variables
//!
//! - `NYX_DEBUG_CODE`: dump recorded instruction tapes to stderr as they
//!   execute. Any non-empty value enables this.
//! - `RUST_LOG=nyx_codegen=trace`: trace registry resolution decisions.

mod builder;
mod ops;
mod range;
mod registry;
pub mod tape;

pub use builder::{IntPredicate, NativeBuilder, TrapCode, ValueId};
pub use ops::register_int_ops;
pub use range::{iter_field, range_field, register_range_ops};
pub use registry::{
    LoweringFn, LoweringId, OpId, OperationRegistry, PatternElem, RegistryBuilder, RegistryError,
    Rejection, ResolveError, SignatureTable, TypePattern, TypingRule,
};
