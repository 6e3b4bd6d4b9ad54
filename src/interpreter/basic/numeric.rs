//! Bitwise logic and arithmetic
//!
//! Operands are popped right-to-left, so `a b SUB` computes `a - b`.
//! Every integer result is checked against `max_integer_size`.

use super::{pop_int, push_int, to_index};
use crate::context::ExecutionContext;
use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::settings::Limits;
use crate::stack::Stack;
use crate::stack_item::StackItem;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Largest shift accepted by SHL and SHR
const MAX_SHIFT: usize = 256;

pub(super) fn execute(context: &mut ExecutionContext, op: OpCode, limits: &Limits) -> Result<(), VmError> {
    let eval = context.evaluation_stack_mut();

    match op {
        /* ---------- Unary ---------- */
        OpCode::INVERT => unary(eval, limits, |x| !x),
        OpCode::INC => unary(eval, limits, |x| x + 1),
        OpCode::DEC => unary(eval, limits, |x| x - 1),
        OpCode::SIGN => unary(eval, limits, |x| x.signum()),
        OpCode::NEGATE => unary(eval, limits, |x| -x),
        OpCode::ABS => unary(eval, limits, |x| x.abs()),
        OpCode::NOT => {
            let value = eval.pop()?.to_bool();
            eval.push(StackItem::from(!value))
        }
        OpCode::NZ => {
            let value = pop_int(eval, limits)?;
            eval.push(StackItem::from(!value.is_zero()))
        }

        /* ---------- Binary ---------- */
        OpCode::AND => binary(eval, limits, |a, b| Ok(a & b)),
        OpCode::OR => binary(eval, limits, |a, b| Ok(a | b)),
        OpCode::XOR => binary(eval, limits, |a, b| Ok(a ^ b)),
        OpCode::ADD => binary(eval, limits, |a, b| Ok(a + b)),
        OpCode::SUB => binary(eval, limits, |a, b| Ok(a - b)),
        OpCode::MUL => binary(eval, limits, |a, b| Ok(a * b)),
        OpCode::DIV => binary(eval, limits, |a, b| {
            if b.is_zero() {
                return Err(VmError::DivisionByZero);
            }
            Ok(a / b)
        }),
        OpCode::MOD => binary(eval, limits, |a, b| {
            if b.is_zero() {
                return Err(VmError::DivisionByZero);
            }
            Ok(a % b)
        }),
        OpCode::SHL => binary(eval, limits, |a, b| Ok(a << shift_amount(&b)?)),
        OpCode::SHR => binary(eval, limits, |a, b| Ok(a >> shift_amount(&b)?)),
        OpCode::MIN => binary(eval, limits, |a, b| Ok(a.min(b))),
        OpCode::MAX => binary(eval, limits, |a, b| Ok(a.max(b))),

        /* ---------- Comparison ---------- */
        OpCode::EQUAL => {
            let b = eval.pop()?;
            let a = eval.pop()?;
            eval.push(StackItem::from(a == b))
        }
        OpCode::BOOLAND | OpCode::BOOLOR => {
            let b = eval.pop()?.to_bool();
            let a = eval.pop()?.to_bool();
            let result = if op == OpCode::BOOLAND { a && b } else { a || b };
            eval.push(StackItem::from(result))
        }
        OpCode::NUMEQUAL => compare(eval, limits, |a, b| a == b),
        OpCode::NUMNOTEQUAL => compare(eval, limits, |a, b| a != b),
        OpCode::LT => compare(eval, limits, |a, b| a < b),
        OpCode::GT => compare(eval, limits, |a, b| a > b),
        OpCode::LTE => compare(eval, limits, |a, b| a <= b),
        OpCode::GTE => compare(eval, limits, |a, b| a >= b),
        OpCode::WITHIN => {
            let upper = pop_int(eval, limits)?;
            let lower = pop_int(eval, limits)?;
            let value = pop_int(eval, limits)?;
            eval.push(StackItem::from(lower <= value && value < upper))
        }
        _ => Err(VmError::InvalidOpcode(op.0)),
    }
}

fn unary(stack: &mut Stack, limits: &Limits, f: impl FnOnce(BigInt) -> BigInt) -> Result<(), VmError> {
    let value = pop_int(stack, limits)?;
    push_int(stack, f(value), limits)
}

fn binary(
    stack: &mut Stack,
    limits: &Limits,
    f: impl FnOnce(BigInt, BigInt) -> Result<BigInt, VmError>,
) -> Result<(), VmError> {
    let b = pop_int(stack, limits)?;
    let a = pop_int(stack, limits)?;
    push_int(stack, f(a, b)?, limits)
}

fn compare(stack: &mut Stack, limits: &Limits, f: impl FnOnce(&BigInt, &BigInt) -> bool) -> Result<(), VmError> {
    let b = pop_int(stack, limits)?;
    let a = pop_int(stack, limits)?;
    stack.push(StackItem::from(f(&a, &b)))
}

fn shift_amount(value: &BigInt) -> Result<usize, VmError> {
    let shift = to_index(value)?;
    if shift > MAX_SHIFT {
        return Err(VmError::LimitExceeded("shift"));
    }
    Ok(shift)
}
