//! Reference tape backend.
//!
//! [`TapeBuilder`] implements [`NativeBuilder`] by recording emitted
//! instructions on a linear tape; [`Machine`] executes the tape with
//! two's-complement semantics at each value's width. This pair stands in
//! for a real native target so lowered code can be run and checked without
//! an instruction encoder. The machine executes incrementally: lowerings
//! may keep appending to the tape and re-run the machine to execute only
//! the new instructions, which is how tests drive the iterator protocol
//! step by step.
//!
//! Set `NYX_DEBUG_CODE` to dump instructions to stderr as they execute.

use std::fmt;
use std::sync::Arc;

use nyx_types::IntWidth;

use crate::builder::{IntPredicate, NativeBuilder, TrapCode, ValueId};

/// Binary arithmetic opcode.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
    Xor,
}

/// One recorded instruction.
#[derive(Clone, Debug)]
pub enum Instr {
    ConstInt {
        dst: ValueId,
        width: IntWidth,
        value: i64,
    },
    Binary {
        op: BinOp,
        dst: ValueId,
        a: ValueId,
        b: ValueId,
    },
    Icmp {
        pred: IntPredicate,
        dst: ValueId,
        a: ValueId,
        b: ValueId,
    },
    Select {
        dst: ValueId,
        cond: ValueId,
        if_true: ValueId,
        if_false: ValueId,
    },
    Alloca {
        dst: ValueId,
        width: IntWidth,
    },
    Load {
        dst: ValueId,
        cell: ValueId,
    },
    Store {
        cell: ValueId,
        value: ValueId,
    },
    TrapIf {
        cond: ValueId,
        code: TrapCode,
    },
    MakeAggregate {
        dst: ValueId,
        fields: Vec<ValueId>,
    },
    GetField {
        dst: ValueId,
        aggregate: ValueId,
        index: usize,
    },
}

/// Instruction recorder implementing the builder interface.
#[derive(Default)]
pub struct TapeBuilder {
    instrs: Vec<Instr>,
    next_value: u32,
}

impl TapeBuilder {
    pub fn new() -> Self {
        TapeBuilder::default()
    }

    fn fresh(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    fn binary(&mut self, op: BinOp, a: ValueId, b: ValueId) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::Binary { op, dst, a, b });
        dst
    }
}

impl NativeBuilder for TapeBuilder {
    fn const_int(&mut self, width: IntWidth, value: i64) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::ConstInt { dst, width, value });
        dst
    }

    fn add(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.binary(BinOp::Add, a, b)
    }

    fn sub(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.binary(BinOp::Sub, a, b)
    }

    fn mul(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.binary(BinOp::Mul, a, b)
    }

    fn sdiv(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.binary(BinOp::Sdiv, a, b)
    }

    fn srem(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.binary(BinOp::Srem, a, b)
    }

    fn xor(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.binary(BinOp::Xor, a, b)
    }

    fn icmp(&mut self, pred: IntPredicate, a: ValueId, b: ValueId) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::Icmp { pred, dst, a, b });
        dst
    }

    fn select(&mut self, cond: ValueId, if_true: ValueId, if_false: ValueId) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::Select {
            dst,
            cond,
            if_true,
            if_false,
        });
        dst
    }

    fn alloca_cell(&mut self, width: IntWidth) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::Alloca { dst, width });
        dst
    }

    fn load(&mut self, cell: ValueId) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::Load { dst, cell });
        dst
    }

    fn store(&mut self, cell: ValueId, value: ValueId) {
        self.instrs.push(Instr::Store { cell, value });
    }

    fn trap_if(&mut self, cond: ValueId, code: TrapCode) {
        self.instrs.push(Instr::TrapIf { cond, code });
    }

    fn make_aggregate(&mut self, fields: &[ValueId]) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::MakeAggregate {
            dst,
            fields: fields.to_vec(),
        });
        dst
    }

    fn get_field(&mut self, aggregate: ValueId, index: usize) -> ValueId {
        let dst = self.fresh();
        self.instrs.push(Instr::GetField {
            dst,
            aggregate,
            index,
        });
        dst
    }
}

/// A runtime value in the machine.
#[derive(Clone, Debug)]
pub enum Value {
    /// Integer bit pattern at a width.
    Int { raw: u64, width: IntWidth },
    /// Address of a stack cell.
    Cell(usize),
    /// Aggregate of field values in declaration order.
    Agg(Arc<[Value]>),
}

impl Value {
    /// Signed interpretation of an integer value.
    pub fn as_signed(&self) -> Option<i64> {
        match self {
            Value::Int { raw, width } => Some(sign_extend(*raw, *width)),
            _ => None,
        }
    }

    /// Unsigned interpretation of an integer value.
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Value::Int { raw, .. } => Some(*raw),
            _ => None,
        }
    }

    /// Boolean interpretation (nonzero integer is true).
    pub fn as_bool(&self) -> Option<bool> {
        self.as_unsigned().map(|raw| raw != 0)
    }
}

fn sign_extend(raw: u64, width: IntWidth) -> i64 {
    let bits = width.bits();
    if bits == 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

fn truncate(value: i64, width: IntWidth) -> u64 {
    (value as u64) & width.mask()
}

/// Malformed-tape failure. These indicate a lowering bug, not a run-time
/// condition of the compiled program.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum MachineError {
    UnboundValue(ValueId),
    NotAnInt(ValueId),
    NotACell(ValueId),
    NotAnAggregate(ValueId),
    FieldOutOfRange { aggregate: ValueId, index: usize },
    DivideByZero,
    WidthMismatch,
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::UnboundValue(v) => write!(f, "value {v:?} used before definition"),
            MachineError::NotAnInt(v) => write!(f, "value {v:?} is not an integer"),
            MachineError::NotACell(v) => write!(f, "value {v:?} is not a cell address"),
            MachineError::NotAnAggregate(v) => write!(f, "value {v:?} is not an aggregate"),
            MachineError::FieldOutOfRange { aggregate, index } => {
                write!(f, "field {index} out of range for aggregate {aggregate:?}")
            }
            MachineError::DivideByZero => f.write_str("unguarded division by zero"),
            MachineError::WidthMismatch => f.write_str("operand widths disagree"),
        }
    }
}

impl std::error::Error for MachineError {}

/// Outcome of running the tape to its current end.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Status {
    /// All instructions executed.
    Completed,
    /// A trap fired; the program is halted and stays halted.
    Trapped(TrapCode),
}

struct CellState {
    raw: u64,
    width: IntWidth,
}

/// Executes a tape. Keeps cell and value state across incremental runs.
#[derive(Default)]
pub struct Machine {
    values: Vec<Option<Value>>,
    cells: Vec<CellState>,
    pc: usize,
    halted: Option<TrapCode>,
}

impl Machine {
    pub fn new() -> Self {
        Machine::default()
    }

    /// Execute instructions appended since the previous run. A halted
    /// machine stays halted.
    pub fn run(&mut self, tape: &TapeBuilder) -> Result<Status, MachineError> {
        if let Some(code) = self.halted {
            return Ok(Status::Trapped(code));
        }
        let debug = std::env::var_os("NYX_DEBUG_CODE").is_some();
        while self.pc < tape.instrs.len() {
            let instr = &tape.instrs[self.pc];
            if debug {
                eprintln!("[nyx tape] {:4}: {instr:?}", self.pc);
            }
            self.pc += 1;
            if let Some(code) = self.step(instr)? {
                self.halted = Some(code);
                // Skip the rest of the tape; the program has halted.
                self.pc = tape.instrs.len();
                return Ok(Status::Trapped(code));
            }
        }
        Ok(Status::Completed)
    }

    /// The value bound to `id`, if defined.
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Signed integer bound to `id`.
    pub fn signed(&self, id: ValueId) -> Result<i64, MachineError> {
        self.value(id)
            .ok_or(MachineError::UnboundValue(id))?
            .as_signed()
            .ok_or(MachineError::NotAnInt(id))
    }

    fn bind(&mut self, id: ValueId, value: Value) {
        let idx = id.0 as usize;
        if self.values.len() <= idx {
            self.values.resize(idx + 1, None);
        }
        self.values[idx] = Some(value);
    }

    fn int_operand(&self, id: ValueId) -> Result<(i64, IntWidth), MachineError> {
        match self.value(id).ok_or(MachineError::UnboundValue(id))? {
            Value::Int { raw, width } => Ok((sign_extend(*raw, *width), *width)),
            _ => Err(MachineError::NotAnInt(id)),
        }
    }

    fn cell_operand(&self, id: ValueId) -> Result<usize, MachineError> {
        match self.value(id).ok_or(MachineError::UnboundValue(id))? {
            Value::Cell(idx) => Ok(*idx),
            _ => Err(MachineError::NotACell(id)),
        }
    }

    fn step(&mut self, instr: &Instr) -> Result<Option<TrapCode>, MachineError> {
        match instr {
            Instr::ConstInt { dst, width, value } => {
                self.bind(
                    *dst,
                    Value::Int {
                        raw: truncate(*value, *width),
                        width: *width,
                    },
                );
            }
            Instr::Binary { op, dst, a, b } => {
                let (lhs, width) = self.int_operand(*a)?;
                let (rhs, rwidth) = self.int_operand(*b)?;
                if width != rwidth {
                    return Err(MachineError::WidthMismatch);
                }
                let result = match op {
                    BinOp::Add => lhs.wrapping_add(rhs),
                    BinOp::Sub => lhs.wrapping_sub(rhs),
                    BinOp::Mul => lhs.wrapping_mul(rhs),
                    BinOp::Sdiv => {
                        if rhs == 0 {
                            return Err(MachineError::DivideByZero);
                        }
                        lhs.wrapping_div(rhs)
                    }
                    BinOp::Srem => {
                        if rhs == 0 {
                            return Err(MachineError::DivideByZero);
                        }
                        lhs.wrapping_rem(rhs)
                    }
                    BinOp::Xor => lhs ^ rhs,
                };
                self.bind(
                    *dst,
                    Value::Int {
                        raw: truncate(result, width),
                        width,
                    },
                );
            }
            Instr::Icmp { pred, dst, a, b } => {
                let (lhs, width) = self.int_operand(*a)?;
                let (rhs, rwidth) = self.int_operand(*b)?;
                if width != rwidth {
                    return Err(MachineError::WidthMismatch);
                }
                let result = match pred {
                    IntPredicate::Eq => lhs == rhs,
                    IntPredicate::Ne => lhs != rhs,
                    IntPredicate::Sgt => lhs > rhs,
                    IntPredicate::Sge => lhs >= rhs,
                    IntPredicate::Slt => lhs < rhs,
                    IntPredicate::Sle => lhs <= rhs,
                };
                self.bind(
                    *dst,
                    Value::Int {
                        raw: u64::from(result),
                        width: IntWidth::W8,
                    },
                );
            }
            Instr::Select {
                dst,
                cond,
                if_true,
                if_false,
            } => {
                let cond = self
                    .value(*cond)
                    .ok_or(MachineError::UnboundValue(*cond))?
                    .as_bool()
                    .ok_or(MachineError::NotAnInt(*cond))?;
                let chosen = if cond { if_true } else { if_false };
                let value = self
                    .value(*chosen)
                    .ok_or(MachineError::UnboundValue(*chosen))?
                    .clone();
                self.bind(*dst, value);
            }
            Instr::Alloca { dst, width } => {
                let idx = self.cells.len();
                self.cells.push(CellState {
                    raw: 0,
                    width: *width,
                });
                self.bind(*dst, Value::Cell(idx));
            }
            Instr::Load { dst, cell } => {
                let idx = self.cell_operand(*cell)?;
                let state = &self.cells[idx];
                self.bind(
                    *dst,
                    Value::Int {
                        raw: state.raw,
                        width: state.width,
                    },
                );
            }
            Instr::Store { cell, value } => {
                let idx = self.cell_operand(*cell)?;
                let (v, width) = self.int_operand(*value)?;
                if width != self.cells[idx].width {
                    return Err(MachineError::WidthMismatch);
                }
                self.cells[idx].raw = truncate(v, width);
            }
            Instr::TrapIf { cond, code } => {
                let fire = self
                    .value(*cond)
                    .ok_or(MachineError::UnboundValue(*cond))?
                    .as_bool()
                    .ok_or(MachineError::NotAnInt(*cond))?;
                if fire {
                    return Ok(Some(*code));
                }
            }
            Instr::MakeAggregate { dst, fields } => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    values.push(
                        self.value(*field)
                            .ok_or(MachineError::UnboundValue(*field))?
                            .clone(),
                    );
                }
                self.bind(*dst, Value::Agg(values.into()));
            }
            Instr::GetField {
                dst,
                aggregate,
                index,
            } => {
                let value = match self
                    .value(*aggregate)
                    .ok_or(MachineError::UnboundValue(*aggregate))?
                {
                    Value::Agg(fields) => fields
                        .get(*index)
                        .ok_or(MachineError::FieldOutOfRange {
                            aggregate: *aggregate,
                            index: *index,
                        })?
                        .clone(),
                    _ => return Err(MachineError::NotAnAggregate(*aggregate)),
                };
                self.bind(*dst, value);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests;
