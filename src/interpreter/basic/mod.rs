//! Reference interpreter
//!
//! Executes the AVM opcode subset one instruction at a time against the
//! engine's current frame. Opcodes are grouped by family:
//! - push: constants and inline data
//! - flow: jumps, calls, returns, syscalls, throws
//! - stack_ops: evaluation/alt stack shuffling
//! - bytes: splice and hashing
//! - numeric: bitwise logic and arithmetic
//! - collections: arrays, structs and maps
//!
//! Limits from `EngineSettings` are enforced where items are created, plus a
//! stack size check after every instruction.

mod bytes;
mod collections;
mod flow;
mod numeric;
mod push;
mod stack_ops;


use super::Interpreter;
use crate::context::ExecutionContext;
use crate::engine::ExecutionEngine;
use crate::errors::VmError;
use crate::settings::Limits;
use crate::stack::Stack;
use crate::stack_item::{integer, StackItem};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicInterpreter;

impl BasicInterpreter {
    pub fn new() -> Self {
        BasicInterpreter
    }
}

impl Interpreter for BasicInterpreter {
    fn execute_instruction(&self, engine: &mut ExecutionEngine) -> Result<(), VmError> {
        let limits = engine.settings().limits;
        let context = current(engine)?;
        let start = context.instruction_pointer();
        let op = context.read_opcode();

        match op.0 {
            0x00..=0x60 => push::execute(context, op, &limits)?,
            0x61..=0x69 | 0xE0..=0xE4 | 0xF0..=0xF1 => flow::execute(engine, op, start)?,
            0x6A..=0x7D => stack_ops::execute(context, op)?,
            0x7E..=0x82 | 0xA8..=0xAA => bytes::execute(context, op, &limits)?,
            0x83..=0xA5 => numeric::execute(context, op, &limits)?,
            0xC0..=0xCD => collections::execute(context, op, &limits)?,
            _ => return Err(VmError::InvalidOpcode(op.0)),
        }

        check_stack_size(engine, &limits)
    }
}

/* ===================== Shared Helpers ===================== */

fn current(engine: &mut ExecutionEngine) -> Result<&mut ExecutionContext, VmError> {
    engine.current_context_mut().ok_or(VmError::NoContext)
}

fn check_stack_size(engine: &ExecutionEngine, limits: &Limits) -> Result<(), VmError> {
    let Some(context) = engine.current_context() else {
        return Ok(());
    };
    let size = context.evaluation_stack().count() + context.alt_stack().count();
    if size > limits.max_stack_size {
        return Err(VmError::LimitExceeded("stack size"));
    }
    Ok(())
}

fn check_integer(value: &BigInt, limits: &Limits) -> Result<(), VmError> {
    if integer::encode(value).len() > limits.max_integer_size {
        return Err(VmError::LimitExceeded("integer size"));
    }
    Ok(())
}

fn check_item_size(len: usize, limits: &Limits) -> Result<(), VmError> {
    if len > limits.max_item_size {
        return Err(VmError::LimitExceeded("item size"));
    }
    Ok(())
}

/// Pop an integer operand, enforcing the integer size limit
fn pop_int(stack: &mut Stack, limits: &Limits) -> Result<BigInt, VmError> {
    let item = stack.pop()?;
    if let Some(len) = item.byte_len() {
        if len > limits.max_integer_size {
            return Err(VmError::LimitExceeded("integer size"));
        }
    }
    item.to_integer()
}

/// Pop a non-negative integer usable as an index or count
fn pop_index(stack: &mut Stack) -> Result<usize, VmError> {
    let value = stack.pop()?.to_integer()?;
    to_index(&value)
}

fn to_index(value: &BigInt) -> Result<usize, VmError> {
    value
        .to_usize()
        .ok_or_else(|| VmError::InvalidArgument(format!("{} is not a valid index", value)))
}

fn push_int(stack: &mut Stack, value: BigInt, limits: &Limits) -> Result<(), VmError> {
    check_integer(&value, limits)?;
    stack.push(StackItem::Integer(value))
}
