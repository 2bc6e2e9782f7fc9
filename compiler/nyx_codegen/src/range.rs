//! Lowering of the fixed-width integer range iterator.
//!
//! The canonical stateful construct: range construction produces an
//! immutable `{start, stop, step}` aggregate; `getiter` derives the
//! iterator state `{cursor*, stop, step, count*}` whose starred fields are
//! stack cells mutated in place by `iternext`. The protocol is
//! check-then-advance: callers test `itervalid` before every `iternext`,
//! and an empty range is invalid before the first advance.
//!
//! The remaining-count computation runs at the input width with wrapping
//! two's-complement arithmetic; nothing is widened and `step` is never
//! negated, so the minimum representable step works. A zero step is a
//! fatal run-time condition: the emitted code traps, it does not return an
//! error value.

use std::sync::Arc;

use nyx_types::{signature, IntWidth, Signedness, TypeDesc};

use crate::builder::{IntPredicate, NativeBuilder, TrapCode, ValueId};
use crate::registry::{LoweringFn, RegistryBuilder, RegistryError, TypePattern, TypingRule};

/// Field order of the range aggregate. The layout provider external to
/// this crate fixes alignment; only declaration order is fixed here.
pub mod range_field {
    pub const START: usize = 0;
    pub const STOP: usize = 1;
    pub const STEP: usize = 2;
}

/// Field order of the iterator aggregate. `CURSOR` and `COUNT` are cells.
pub mod iter_field {
    pub const CURSOR: usize = 0;
    pub const STOP: usize = 1;
    pub const STEP: usize = 2;
    pub const COUNT: usize = 3;
}

fn build_range(
    bld: &mut dyn NativeBuilder,
    width: IntWidth,
    start: Option<ValueId>,
    stop: ValueId,
    step: Option<ValueId>,
) -> ValueId {
    let start = start.unwrap_or_else(|| bld.const_int(width, 0));
    let step = step.unwrap_or_else(|| bld.const_int(width, 1));
    bld.make_aggregate(&[start, stop, step])
}

fn build_getiter(bld: &mut dyn NativeBuilder, width: IntWidth, state: ValueId) -> ValueId {
    let start = bld.get_field(state, range_field::START);
    let stop = bld.get_field(state, range_field::STOP);
    let step = bld.get_field(state, range_field::STEP);

    let cursor = bld.alloca_cell(width);
    bld.store(cursor, start);
    let count = bld.alloca_cell(width);

    let zero = bld.const_int(width, 0);
    let one = bld.const_int(width, 1);

    // A zero step makes iteration undefined and there is no exception
    // mechanism to unwind through: halt the program.
    let zero_step = bld.icmp(IntPredicate::Eq, step, zero);
    bld.trap_if(zero_step, TrapCode::AssertionError);

    let diff = bld.sub(stop, start);
    let pos_diff = bld.icmp(IntPredicate::Sgt, diff, zero);
    let pos_step = bld.icmp(IntPredicate::Sgt, step, zero);
    let sign_differs = bld.xor(pos_diff, pos_step);

    // Ceiling-style count for the same-sign case: diff/step, plus one if a
    // nonzero remainder is left over.
    let quot = bld.sdiv(diff, step);
    let rem = bld.srem(diff, step);
    let uneven = bld.icmp(IntPredicate::Ne, rem, zero);
    let extra = bld.select(uneven, one, zero);
    let full = bld.add(quot, extra);
    let total = bld.select(sign_differs, zero, full);

    // The cell holds total - 1 so `itervalid` (count >= 0) is false for an
    // empty range before any advance.
    let biased = bld.sub(total, one);
    bld.store(count, biased);

    bld.make_aggregate(&[cursor, stop, step, count])
}

fn build_iternext(bld: &mut dyn NativeBuilder, width: IntWidth, iter: ValueId) -> ValueId {
    let cursor = bld.get_field(iter, iter_field::CURSOR);
    let step = bld.get_field(iter, iter_field::STEP);
    let count = bld.get_field(iter, iter_field::COUNT);

    let res = bld.load(cursor);
    let one = bld.const_int(width, 1);

    let remaining = bld.load(count);
    let decremented = bld.sub(remaining, one);
    bld.store(count, decremented);

    let next = bld.add(res, step);
    bld.store(cursor, next);

    res
}

fn build_itervalid(bld: &mut dyn NativeBuilder, width: IntWidth, iter: ValueId) -> ValueId {
    let count = bld.get_field(iter, iter_field::COUNT);
    let zero = bld.const_int(width, 0);
    let remaining = bld.load(count);
    bld.icmp(IntPredicate::Sge, remaining, zero)
}

/// Register typing and lowering for range construction, `getiter`,
/// `iternext`, and `itervalid` over the given signed integer widths.
///
/// One typing rule per operation covers all widths, so this is called once
/// with the full width list.
pub fn register_range_ops(
    builder: &mut RegistryBuilder,
    widths: &[IntWidth],
) -> Result<(), RegistryError> {
    let range_op = builder.operation("range");
    let getiter_op = builder.operation("getiter");
    let iternext_op = builder.operation("iternext");
    let itervalid_op = builder.operation("itervalid");

    let int_of = |w: IntWidth| TypeDesc::Int(w, Signedness::Signed);

    let mut range_cases = Vec::new();
    let mut getiter_cases = Vec::new();
    let mut iternext_cases = Vec::new();
    let mut itervalid_cases = Vec::new();
    for &w in widths {
        let int_ty = int_of(w);
        let range_ty = TypeDesc::Range(w);
        let iter_ty = TypeDesc::RangeIter(w);
        range_cases.push(signature(range_ty, &[int_ty]));
        range_cases.push(signature(range_ty, &[int_ty, int_ty]));
        range_cases.push(signature(range_ty, &[int_ty, int_ty, int_ty]));
        getiter_cases.push(signature(iter_ty, &[range_ty]));
        iternext_cases.push(signature(int_ty, &[iter_ty]));
        itervalid_cases.push(signature(TypeDesc::Bool, &[iter_ty]));
    }
    builder.register_typing(range_op, TypingRule::from_signatures(range_cases))?;
    builder.register_typing(getiter_op, TypingRule::from_signatures(getiter_cases))?;
    builder.register_typing(iternext_op, TypingRule::from_signatures(iternext_cases))?;
    builder.register_typing(itervalid_op, TypingRule::from_signatures(itervalid_cases))?;

    for &w in widths {
        let int_ty = int_of(w);
        let range_ty = TypeDesc::Range(w);
        let iter_ty = TypeDesc::RangeIter(w);

        let range1: LoweringFn =
            Arc::new(move |bld, _sig, args| build_range(bld, w, None, args[0], None));
        builder.register_lowering(range_op, TypePattern::exact(&[int_ty]), range1);

        let range2: LoweringFn =
            Arc::new(move |bld, _sig, args| build_range(bld, w, Some(args[0]), args[1], None));
        builder.register_lowering(range_op, TypePattern::exact(&[int_ty, int_ty]), range2);

        let range3: LoweringFn = Arc::new(move |bld, _sig, args| {
            build_range(bld, w, Some(args[0]), args[1], Some(args[2]))
        });
        builder.register_lowering(
            range_op,
            TypePattern::exact(&[int_ty, int_ty, int_ty]),
            range3,
        );

        let getiter: LoweringFn = Arc::new(move |bld, _sig, args| build_getiter(bld, w, args[0]));
        builder.register_lowering(getiter_op, TypePattern::exact(&[range_ty]), getiter);

        let iternext: LoweringFn = Arc::new(move |bld, _sig, args| build_iternext(bld, w, args[0]));
        builder.register_lowering(iternext_op, TypePattern::exact(&[iter_ty]), iternext);

        let itervalid: LoweringFn =
            Arc::new(move |bld, _sig, args| build_itervalid(bld, w, args[0]));
        builder.register_lowering(itervalid_op, TypePattern::exact(&[iter_ty]), itervalid);
    }

    Ok(())
}
