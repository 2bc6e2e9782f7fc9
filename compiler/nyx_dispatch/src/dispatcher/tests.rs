#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use nyx_codegen::tape::{Machine, TapeBuilder};
use nyx_codegen::{
    register_int_ops, NativeBuilder, OperationRegistry, RegistryBuilder, ResolveError,
};
use nyx_types::{HashFailure, IntWidth, TypeDesc, TypeLike};

use super::{DescriptorInterner, Dispatcher};
use crate::cache::{CompileError, EntryPoint};

fn registry() -> Arc<OperationRegistry> {
    crate::init_tracing();
    let mut builder = RegistryBuilder::new();
    register_int_ops(&mut builder, &[IntWidth::W32, IntWidth::W64]).unwrap();
    Arc::new(builder.seal())
}

/// A descriptor value with no projection into the compiler's type space.
struct Foreign;

impl TypeLike for Foreign {
    fn type_hash(&self) -> Result<u64, HashFailure> {
        Ok(0)
    }

    fn type_eq(&self, _other: &dyn TypeLike) -> Option<bool> {
        None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn type_name(&self) -> String {
        "foreign".to_owned()
    }

    fn descriptor(&self) -> Option<TypeDesc> {
        None
    }
}

#[test]
fn interner_hands_out_one_allocation_per_descriptor() {
    let interner = DescriptorInterner::new();
    let a = interner.intern(TypeDesc::I64);
    let b = interner.intern(TypeDesc::I64);
    assert!(Arc::ptr_eq(&a, &b));
    let c = interner.intern(TypeDesc::I32);
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(interner.len(), 2);
}

#[test]
fn repeated_calls_reuse_the_compiled_specialization() {
    let dispatcher = Dispatcher::new(registry());
    let add = dispatcher.registry().op("add").unwrap();
    let args = [dispatcher.descriptor(TypeDesc::I64), dispatcher.descriptor(TypeDesc::I64)];
    let emits = AtomicU64::new(0);

    let first = dispatcher
        .specialize(add, &args, |_, _| {
            EntryPoint(emits.fetch_add(1, Ordering::SeqCst))
        })
        .unwrap();
    let second = dispatcher
        .specialize(add, &args, |_, _| {
            EntryPoint(emits.fetch_add(1, Ordering::SeqCst))
        })
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(emits.load(Ordering::SeqCst), 1);
    assert_eq!(first.result(), TypeDesc::I64);
    assert_eq!(dispatcher.cache().len(), 1);
}

#[test]
fn distinct_widths_get_distinct_entries() {
    let dispatcher = Dispatcher::new(registry());
    let add = dispatcher.registry().op("add").unwrap();
    let next = AtomicU64::new(0);
    let emit = || EntryPoint(next.fetch_add(1, Ordering::SeqCst));

    let wide_args = [dispatcher.descriptor(TypeDesc::I64), dispatcher.descriptor(TypeDesc::I64)];
    let narrow_args = [dispatcher.descriptor(TypeDesc::I32), dispatcher.descriptor(TypeDesc::I32)];
    let wide = dispatcher.specialize(add, &wide_args, |_, _| emit()).unwrap();
    let narrow = dispatcher.specialize(add, &narrow_args, |_, _| emit()).unwrap();

    assert!(!Arc::ptr_eq(&wide, &narrow));
    assert_ne!(wide.entry(), narrow.entry());
    assert_eq!(wide.result(), TypeDesc::I64);
    assert_eq!(narrow.result(), TypeDesc::I32);
}

#[test]
fn typing_rejection_skips_the_cache() {
    let dispatcher = Dispatcher::new(registry());
    let add = dispatcher.registry().op("add").unwrap();
    let args = [dispatcher.descriptor(TypeDesc::I64), dispatcher.descriptor(TypeDesc::I32)];

    let err = dispatcher
        .specialize(add, &args, |_, _| panic!("emit must not run"))
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Resolve(ResolveError::TypeRejected { .. })
    ));
    assert!(dispatcher.cache().is_empty());
}

#[test]
fn unprojectable_argument_is_reported_by_name() {
    let dispatcher = Dispatcher::new(registry());
    let add = dispatcher.registry().op("add").unwrap();
    let args: [Arc<dyn TypeLike>; 2] =
        [Arc::new(Foreign), dispatcher.descriptor(TypeDesc::I64)];

    let err = dispatcher
        .specialize(add, &args, |_, _| panic!("emit must not run"))
        .unwrap_err();
    match err {
        CompileError::UnknownType { name } => assert_eq!(name, "foreign"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn emitted_code_computes_the_operation() {
    let dispatcher = Dispatcher::new(registry());
    let add = dispatcher.registry().op("add").unwrap();
    let args = [dispatcher.descriptor(TypeDesc::I64), dispatcher.descriptor(TypeDesc::I64)];

    let mut tape = TapeBuilder::new();
    let mut out = None;
    dispatcher
        .specialize(add, &args, |lowering, sig| {
            let width = sig.params[0].int_width().unwrap();
            let lhs = tape.const_int(width, 40);
            let rhs = tape.const_int(width, 2);
            out = Some(lowering(&mut tape, sig, &[lhs, rhs]));
            EntryPoint(0)
        })
        .unwrap();

    let mut machine = Machine::new();
    machine.run(&tape).unwrap();
    assert_eq!(machine.signed(out.unwrap()).unwrap(), 42);
}
