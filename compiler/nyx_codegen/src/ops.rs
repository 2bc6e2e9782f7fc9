//! Builtin integer operator tables.
//!
//! Arithmetic (`add`, `sub`, `mul`) is registered with one exact pattern
//! per width; comparisons (`eq`, `lt`) are registered once against the
//! any-int category, exercising the pattern-match path of lowering
//! selection. The typing side is a concrete signature table per operation,
//! in the same shape as the range typing.

use std::sync::Arc;

use nyx_types::{signature, IntWidth, Signedness, TypeCategory, TypeDesc};

use crate::builder::IntPredicate;
use crate::registry::{LoweringFn, RegistryBuilder, RegistryError, TypePattern, TypingRule};

/// Register typing and lowering for the builtin integer operators over the
/// given signed widths.
pub fn register_int_ops(
    builder: &mut RegistryBuilder,
    widths: &[IntWidth],
) -> Result<(), RegistryError> {
    let int_of = |w: IntWidth| TypeDesc::Int(w, Signedness::Signed);

    let arith: [(&str, LoweringFn); 3] = [
        ("add", Arc::new(|bld, _sig, args| bld.add(args[0], args[1]))),
        ("sub", Arc::new(|bld, _sig, args| bld.sub(args[0], args[1]))),
        ("mul", Arc::new(|bld, _sig, args| bld.mul(args[0], args[1]))),
    ];
    for (name, imp) in arith {
        let op = builder.operation(name);
        let cases = widths
            .iter()
            .map(|&w| signature(int_of(w), &[int_of(w), int_of(w)]))
            .collect();
        builder.register_typing(op, TypingRule::from_signatures(cases))?;
        for &w in widths {
            let int_ty = int_of(w);
            builder.register_lowering(op, TypePattern::exact(&[int_ty, int_ty]), Arc::clone(&imp));
        }
    }

    let compare: [(&str, IntPredicate); 2] = [("eq", IntPredicate::Eq), ("lt", IntPredicate::Slt)];
    for (name, pred) in compare {
        let op = builder.operation(name);
        let cases = widths
            .iter()
            .map(|&w| signature(TypeDesc::Bool, &[int_of(w), int_of(w)]))
            .collect();
        builder.register_typing(op, TypingRule::from_signatures(cases))?;
        let imp: LoweringFn = Arc::new(move |bld, _sig, args| bld.icmp(pred, args[0], args[1]));
        builder.register_lowering(
            op,
            TypePattern::categories(&[TypeCategory::AnyInt, TypeCategory::AnyInt]),
            imp,
        );
    }

    Ok(())
}
