//! The native code-generation collaborator interface.
//!
//! A `NativeBuilder` is the opaque handle a lowering implementation emits
//! through. The real backend wraps a target IR builder; tests use the tape
//! backend in [`crate::tape`]. One builder handle is never shared across
//! concurrent compiles.
//!
//! All integer arithmetic is two's-complement at the operand width: results
//! wrap, nothing is silently widened.

use nyx_types::IntWidth;

/// Handle to a value inside the target builder.
///
/// Values are immutable once emitted; mutable state goes through stack
/// cells (`alloca_cell` / `load` / `store`).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ValueId(pub u32);

/// Comparison predicate for `icmp`. Signed where signedness matters.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IntPredicate {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
}

/// Reason carried by a trap instruction.
///
/// A trap is a property of the generated code: the condition is evaluated
/// when the compiled program runs, and on failure the program halts. It is
/// not a compilation-time error.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TrapCode {
    /// An invariant of the lowered construct was violated at run time
    /// (e.g. a zero step handed to range iteration).
    AssertionError,
    /// Control reached code the lowering proved unreachable.
    Unreachable,
}

/// Primitives offered by the code-generation backend.
///
/// Comparison results are boolean values represented as 1-bit integers;
/// they are valid operands to `select`, `xor`, and `trap_if`.
pub trait NativeBuilder {
    /// Emit an integer constant of the given width. `value` is truncated
    /// to the width's bit pattern.
    fn const_int(&mut self, width: IntWidth, value: i64) -> ValueId;

    /// Wrapping addition at the operand width.
    fn add(&mut self, a: ValueId, b: ValueId) -> ValueId;

    /// Wrapping subtraction at the operand width.
    fn sub(&mut self, a: ValueId, b: ValueId) -> ValueId;

    /// Wrapping multiplication at the operand width.
    fn mul(&mut self, a: ValueId, b: ValueId) -> ValueId;

    /// Signed division, truncated toward zero, wrapping on overflow.
    fn sdiv(&mut self, a: ValueId, b: ValueId) -> ValueId;

    /// Signed remainder; the result carries the sign of the dividend.
    fn srem(&mut self, a: ValueId, b: ValueId) -> ValueId;

    /// Bitwise exclusive or.
    fn xor(&mut self, a: ValueId, b: ValueId) -> ValueId;

    /// Integer comparison producing a boolean value.
    fn icmp(&mut self, pred: IntPredicate, a: ValueId, b: ValueId) -> ValueId;

    /// `cond ? if_true : if_false`.
    fn select(&mut self, cond: ValueId, if_true: ValueId, if_false: ValueId) -> ValueId;

    /// Allocate a stack cell for one integer of the given width,
    /// initialized to zero. The returned value is the cell's address.
    fn alloca_cell(&mut self, width: IntWidth) -> ValueId;

    /// Load the integer stored in a cell.
    fn load(&mut self, cell: ValueId) -> ValueId;

    /// Store an integer into a cell.
    fn store(&mut self, cell: ValueId, value: ValueId);

    /// Halt the running program with `code` if `cond` is true.
    fn trap_if(&mut self, cond: ValueId, code: TrapCode);

    /// Build an aggregate value from fields in declaration order.
    fn make_aggregate(&mut self, fields: &[ValueId]) -> ValueId;

    /// Project a field out of an aggregate value.
    fn get_field(&mut self, aggregate: ValueId, index: usize) -> ValueId;
}
