//! Flow control, stack isolation and exceptions
//!
//! Offsets are relative to the start of the instruction that carries them.
//! Calls move their arguments from the caller's evaluation stack into the
//! new frame; RET moves return values back (or onto the result stack when
//! the last frame returns).

use super::current;
use crate::context::{ExecutionContext, RETURN_ALL};
use crate::engine::ExecutionEngine;
use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::script::ScriptHash;

pub(super) fn execute(engine: &mut ExecutionEngine, op: OpCode, start: usize) -> Result<(), VmError> {
    match op {
        OpCode::NOP => Ok(()),
        OpCode::JMP | OpCode::JMPIF | OpCode::JMPIFNOT => jump(current(engine)?, op, start),
        OpCode::CALL => call(engine, start),
        OpCode::RET => ret(engine),
        OpCode::APPCALL | OpCode::TAILCALL => app_call(engine, op == OpCode::TAILCALL),
        OpCode::SYSCALL => syscall(engine),
        OpCode::CALL_I => call_i(engine, start),
        OpCode::CALL_E | OpCode::CALL_ED | OpCode::CALL_ET | OpCode::CALL_EDT => call_e(engine, op),
        OpCode::THROW => Err(VmError::Thrown),
        OpCode::THROWIFNOT => {
            if current(engine)?.evaluation_stack_mut().pop()?.to_bool() {
                Ok(())
            } else {
                Err(VmError::Thrown)
            }
        }
        _ => Err(VmError::InvalidOpcode(op.0)),
    }
}

/* ===================== Jumps ===================== */

fn jump_target(context: &mut ExecutionContext, start: usize) -> Result<i64, VmError> {
    let offset = context.read_i16()?;
    let target = start as i64 + i64::from(offset);
    if target < 0 || target as usize > context.script().len() {
        return Err(VmError::InvalidJump(target));
    }
    Ok(target)
}

fn jump(context: &mut ExecutionContext, op: OpCode, start: usize) -> Result<(), VmError> {
    let target = jump_target(context, start)?;
    let taken = match op {
        OpCode::JMPIF => context.evaluation_stack_mut().pop()?.to_bool(),
        OpCode::JMPIFNOT => !context.evaluation_stack_mut().pop()?.to_bool(),
        _ => true,
    };
    if taken {
        context.jump_to(target)?;
    }
    Ok(())
}

/* ===================== Calls ===================== */

/// CALL: same script, every operand moves to the callee
fn call(engine: &mut ExecutionEngine, start: usize) -> Result<(), VmError> {
    let context = current(engine)?;
    let target = jump_target(context, start)?;
    let script = context.script().clone();

    let mut callee = engine.new_context(script, RETURN_ALL);
    callee.jump_to(target)?;
    let caller = current(engine)?;
    let count = caller.evaluation_stack().count();
    caller.evaluation_stack_mut().move_to(callee.evaluation_stack_mut(), count)?;
    engine.push_context(callee)
}

/// CALL_I: same script with explicit return and parameter counts
fn call_i(engine: &mut ExecutionEngine, start: usize) -> Result<(), VmError> {
    let context = current(engine)?;
    let rvcount = i32::from(context.read_u8()?);
    let pcount = usize::from(context.read_u8()?);
    let target = jump_target(context, start)?;
    let script = context.script().clone();

    let mut callee = engine.new_context(script, rvcount);
    callee.jump_to(target)?;
    current(engine)?
        .evaluation_stack_mut()
        .move_to(callee.evaluation_stack_mut(), pcount)?;
    engine.push_context(callee)
}

/// APPCALL / TAILCALL: another script, every operand moves to the callee
fn app_call(engine: &mut ExecutionEngine, tail_call: bool) -> Result<(), VmError> {
    let context = current(engine)?;
    let mut hash = read_hash(context)?;
    let is_dynamic = hash.iter().all(|b| *b == 0);
    if is_dynamic {
        hash = pop_hash(context)?;
    }

    let script = engine.resolve_script(&hash, is_dynamic)?;
    let mut callee = engine.new_context(script, RETURN_ALL);
    let caller = current(engine)?;
    let count = caller.evaluation_stack().count();
    caller.evaluation_stack_mut().move_to(callee.evaluation_stack_mut(), count)?;
    enter(engine, callee, tail_call)
}

/// CALL_E, CALL_ED, CALL_ET, CALL_EDT: another script with explicit counts
///
/// D pops the hash from the stack instead of reading it inline; T replaces
/// the current frame, which must expect the same number of return values.
fn call_e(engine: &mut ExecutionEngine, op: OpCode) -> Result<(), VmError> {
    let is_dynamic = matches!(op, OpCode::CALL_ED | OpCode::CALL_EDT);
    let tail_call = matches!(op, OpCode::CALL_ET | OpCode::CALL_EDT);

    let context = current(engine)?;
    let rvcount = i32::from(context.read_u8()?);
    let pcount = usize::from(context.read_u8()?);
    if tail_call && context.rvcount() != rvcount {
        return Err(VmError::InvalidArgument(format!(
            "tail call returns {} values but the frame expects {}",
            rvcount,
            context.rvcount()
        )));
    }
    let hash = if is_dynamic {
        pop_hash(context)?
    } else {
        read_hash(context)?
    };

    let script = engine.resolve_script(&hash, is_dynamic)?;
    let mut callee = engine.new_context(script, rvcount);
    current(engine)?
        .evaluation_stack_mut()
        .move_to(callee.evaluation_stack_mut(), pcount)?;
    enter(engine, callee, tail_call)
}

fn enter(engine: &mut ExecutionEngine, callee: ExecutionContext, tail_call: bool) -> Result<(), VmError> {
    if tail_call {
        if let Some(mut replaced) = engine.pop_context() {
            replaced.dispose();
        }
    }
    engine.push_context(callee)
}

fn read_hash(context: &mut ExecutionContext) -> Result<ScriptHash, VmError> {
    let bytes = context.read_bytes(20)?;
    let mut hash = ScriptHash::default();
    hash.copy_from_slice(bytes);
    Ok(hash)
}

fn pop_hash(context: &mut ExecutionContext) -> Result<ScriptHash, VmError> {
    let bytes = context.evaluation_stack_mut().pop()?.to_byte_array()?;
    ScriptHash::try_from(&bytes[..])
        .map_err(|_| VmError::InvalidArgument(format!("script hash must be 20 bytes, got {}", bytes.len())))
}

/* ===================== Return ===================== */

fn ret(engine: &mut ExecutionEngine) -> Result<(), VmError> {
    let context = current(engine)?;
    let rvcount = context.rvcount();
    let available = context.evaluation_stack().count();
    let count = if rvcount == RETURN_ALL {
        available
    } else {
        usize::try_from(rvcount).map_err(|_| VmError::InvalidArgument(format!("invalid return count {}", rvcount)))?
    };
    if count > available {
        return Err(VmError::IndexOutOfRange {
            index: count,
            count: available,
        });
    }

    let Some(mut returning) = engine.pop_context() else {
        return Err(VmError::NoContext);
    };
    let result = hand_back(engine, &returning, count, rvcount == RETURN_ALL);
    returning.dispose();
    result
}

fn hand_back(
    engine: &mut ExecutionEngine,
    returning: &ExecutionContext,
    count: usize,
    return_all: bool,
) -> Result<(), VmError> {
    match engine.current_context_mut() {
        Some(caller) => {
            let (evaluation, alt) = caller.stacks_mut();
            returning.evaluation_stack().copy_to(evaluation, Some(count))?;
            if return_all {
                returning.alt_stack().copy_to(alt, None)?;
            }
            Ok(())
        }
        None => returning
            .evaluation_stack()
            .copy_to(engine.result_stack_mut(), Some(count)),
    }
}

/* ===================== Syscall ===================== */

fn syscall(engine: &mut ExecutionEngine) -> Result<(), VmError> {
    let context = current(engine)?;
    let len = usize::from(context.read_u8()?);
    let name = context.read_bytes(len)?.to_vec();

    if engine.invoke_syscall(&name) {
        Ok(())
    } else {
        Err(VmError::SyscallFailed(String::from_utf8_lossy(&name).into_owned()))
    }
}
