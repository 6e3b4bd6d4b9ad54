//! Stack: alt stack transfers and evaluation stack shuffles

use super::pop_index;
use crate::context::ExecutionContext;
use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::stack_item::StackItem;

pub(super) fn execute(context: &mut ExecutionContext, op: OpCode) -> Result<(), VmError> {
    let (eval, alt) = context.stacks_mut();

    match op {
        OpCode::DUPFROMALTSTACK => {
            let item = alt.peek(0)?;
            eval.push(item)
        }
        OpCode::TOALTSTACK => {
            let item = eval.pop()?;
            alt.push(item)
        }
        OpCode::FROMALTSTACK => {
            let item = alt.pop()?;
            eval.push(item)
        }
        OpCode::XDROP => {
            let n = pop_index(eval)?;
            eval.remove(n).map(drop)
        }
        OpCode::XSWAP => {
            let n = pop_index(eval)?;
            if n == 0 {
                return Ok(());
            }
            let deep = eval.peek(n)?;
            let top = eval.peek(0)?;
            eval.set(n, top)?;
            eval.set(0, deep)
        }
        OpCode::XTUCK => {
            let n = pop_index(eval)?;
            if n == 0 {
                return Err(VmError::InvalidArgument("XTUCK needs a positive index".to_string()));
            }
            let top = eval.peek(0)?;
            eval.insert(n, top)
        }
        OpCode::DEPTH => {
            let depth = eval.count();
            eval.push(StackItem::from(depth))
        }
        OpCode::DROP => eval.pop().map(drop),
        OpCode::DUP => {
            let top = eval.peek(0)?;
            eval.push(top)
        }
        OpCode::NIP => eval.remove(1).map(drop),
        OpCode::OVER => {
            let second = eval.peek(1)?;
            eval.push(second)
        }
        OpCode::PICK => {
            let n = pop_index(eval)?;
            let item = eval.peek(n)?;
            eval.push(item)
        }
        OpCode::ROLL => {
            let n = pop_index(eval)?;
            if n == 0 {
                return Ok(());
            }
            let item = eval.remove(n)?;
            eval.push(item)
        }
        OpCode::ROT => {
            let item = eval.remove(2)?;
            eval.push(item)
        }
        OpCode::SWAP => {
            let item = eval.remove(1)?;
            eval.push(item)
        }
        OpCode::TUCK => {
            let top = eval.peek(0)?;
            eval.insert(2, top)
        }
        _ => Err(VmError::InvalidOpcode(op.0)),
    }
}
