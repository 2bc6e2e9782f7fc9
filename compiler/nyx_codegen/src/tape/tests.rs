#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;

use nyx_types::IntWidth;

use crate::builder::{IntPredicate, NativeBuilder, TrapCode};

use super::*;

fn run(tape: &TapeBuilder) -> (Machine, Status) {
    let mut machine = Machine::new();
    let status = machine.run(tape).unwrap();
    (machine, status)
}

#[test]
fn constants_truncate_to_width() {
    let mut tape = TapeBuilder::new();
    let v = tape.const_int(IntWidth::W8, 0x1ff);
    let (machine, status) = run(&tape);
    assert_eq!(status, Status::Completed);
    // 0x1ff at 8 bits is 0xff, i.e. -1 signed.
    assert_eq!(machine.signed(v).unwrap(), -1);
}

#[test]
fn arithmetic_wraps_at_width() {
    let mut tape = TapeBuilder::new();
    let max = tape.const_int(IntWidth::W8, 127);
    let one = tape.const_int(IntWidth::W8, 1);
    let sum = tape.add(max, one);
    let product = tape.mul(max, max);
    let (machine, _) = run(&tape);
    assert_eq!(machine.signed(sum).unwrap(), -128);
    // 127 * 127 = 16129 = 0x3f01; low byte 0x01.
    assert_eq!(machine.signed(product).unwrap(), 1);
}

#[test]
fn signed_division_truncates_toward_zero() {
    let mut tape = TapeBuilder::new();
    let a = tape.const_int(IntWidth::W64, -7);
    let b = tape.const_int(IntWidth::W64, 2);
    let quot = tape.sdiv(a, b);
    let rem = tape.srem(a, b);
    let (machine, _) = run(&tape);
    assert_eq!(machine.signed(quot).unwrap(), -3);
    assert_eq!(machine.signed(rem).unwrap(), -1);
}

#[test]
fn division_overflow_wraps() {
    let mut tape = TapeBuilder::new();
    let min = tape.const_int(IntWidth::W64, i64::MIN);
    let neg_one = tape.const_int(IntWidth::W64, -1);
    let quot = tape.sdiv(min, neg_one);
    let (machine, _) = run(&tape);
    assert_eq!(machine.signed(quot).unwrap(), i64::MIN);
}

#[test]
fn unguarded_division_by_zero_is_a_tape_error() {
    let mut tape = TapeBuilder::new();
    let a = tape.const_int(IntWidth::W64, 1);
    let zero = tape.const_int(IntWidth::W64, 0);
    tape.sdiv(a, zero);
    let mut machine = Machine::new();
    assert_eq!(machine.run(&tape).unwrap_err(), MachineError::DivideByZero);
}

#[test]
fn comparisons_and_select() {
    let mut tape = TapeBuilder::new();
    let two = tape.const_int(IntWidth::W32, 2);
    let three = tape.const_int(IntWidth::W32, 3);
    let lt = tape.icmp(IntPredicate::Slt, two, three);
    let ge = tape.icmp(IntPredicate::Sge, two, three);
    let picked = tape.select(lt, two, three);
    let (machine, _) = run(&tape);
    assert_eq!(machine.value(lt).unwrap().as_bool(), Some(true));
    assert_eq!(machine.value(ge).unwrap().as_bool(), Some(false));
    assert_eq!(machine.signed(picked).unwrap(), 2);
}

#[test]
fn cells_initialize_to_zero_and_hold_stores() {
    let mut tape = TapeBuilder::new();
    let cell = tape.alloca_cell(IntWidth::W32);
    let initial = tape.load(cell);
    let five = tape.const_int(IntWidth::W32, 5);
    tape.store(cell, five);
    let after = tape.load(cell);
    let (machine, _) = run(&tape);
    assert_eq!(machine.signed(initial).unwrap(), 0);
    assert_eq!(machine.signed(after).unwrap(), 5);
}

#[test]
fn store_width_mismatch_is_a_tape_error() {
    let mut tape = TapeBuilder::new();
    let cell = tape.alloca_cell(IntWidth::W32);
    let wide = tape.const_int(IntWidth::W64, 5);
    tape.store(cell, wide);
    let mut machine = Machine::new();
    assert_eq!(machine.run(&tape).unwrap_err(), MachineError::WidthMismatch);
}

#[test]
fn trap_halts_and_stays_halted() {
    let mut tape = TapeBuilder::new();
    let one = tape.const_int(IntWidth::W8, 1);
    tape.trap_if(one, TrapCode::AssertionError);
    let unreached = tape.const_int(IntWidth::W8, 42);

    let mut machine = Machine::new();
    assert_eq!(
        machine.run(&tape).unwrap(),
        Status::Trapped(TrapCode::AssertionError)
    );
    assert!(machine.value(unreached).is_none());

    // Appending more code does not revive a halted program.
    tape.const_int(IntWidth::W8, 7);
    assert_eq!(
        machine.run(&tape).unwrap(),
        Status::Trapped(TrapCode::AssertionError)
    );
}

#[test]
fn false_trap_condition_is_inert() {
    let mut tape = TapeBuilder::new();
    let zero = tape.const_int(IntWidth::W8, 0);
    tape.trap_if(zero, TrapCode::AssertionError);
    let v = tape.const_int(IntWidth::W8, 9);
    let (machine, status) = run(&tape);
    assert_eq!(status, Status::Completed);
    assert_eq!(machine.signed(v).unwrap(), 9);
}

#[test]
fn aggregates_project_fields() {
    let mut tape = TapeBuilder::new();
    let a = tape.const_int(IntWidth::W64, 10);
    let b = tape.const_int(IntWidth::W64, 20);
    let agg = tape.make_aggregate(&[a, b]);
    let first = tape.get_field(agg, 0);
    let second = tape.get_field(agg, 1);
    let (machine, _) = run(&tape);
    assert_eq!(machine.signed(first).unwrap(), 10);
    assert_eq!(machine.signed(second).unwrap(), 20);
}

#[test]
fn field_out_of_range_is_a_tape_error() {
    let mut tape = TapeBuilder::new();
    let a = tape.const_int(IntWidth::W64, 10);
    let agg = tape.make_aggregate(&[a]);
    tape.get_field(agg, 3);
    let mut machine = Machine::new();
    assert!(matches!(
        machine.run(&tape).unwrap_err(),
        MachineError::FieldOutOfRange { index: 3, .. }
    ));
}

#[test]
fn incremental_execution_keeps_state() {
    let mut tape = TapeBuilder::new();
    let cell = tape.alloca_cell(IntWidth::W64);
    let one = tape.const_int(IntWidth::W64, 1);
    let mut machine = Machine::new();
    assert_eq!(machine.run(&tape).unwrap(), Status::Completed);

    // Append an increment and run only the new instructions, twice.
    for expected in [1, 2] {
        let current = tape.load(cell);
        let next = tape.add(current, one);
        tape.store(cell, next);
        let observed = tape.load(cell);
        assert_eq!(machine.run(&tape).unwrap(), Status::Completed);
        assert_eq!(machine.signed(observed).unwrap(), expected);
    }
}
