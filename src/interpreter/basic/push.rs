//! Constants: PUSH0, PUSHBYTES1-75, PUSHDATA1/2/4, PUSHM1, PUSH1-16

use super::check_item_size;
use crate::context::ExecutionContext;
use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::settings::Limits;
use crate::stack_item::StackItem;

pub(super) fn execute(context: &mut ExecutionContext, op: OpCode, limits: &Limits) -> Result<(), VmError> {
    let item = match op {
        OpCode::PUSH0 => StackItem::from(Vec::<u8>::new()),
        OpCode::PUSHDATA1 => {
            let len = usize::from(context.read_u8()?);
            read_data(context, len, limits)?
        }
        OpCode::PUSHDATA2 => {
            let len = usize::from(context.read_u16()?);
            read_data(context, len, limits)?
        }
        OpCode::PUSHDATA4 => {
            let len = context.read_u32()? as usize;
            read_data(context, len, limits)?
        }
        OpCode::PUSHM1 => StackItem::from(-1),
        op if op.is_push_bytes() => StackItem::from(context.read_bytes(usize::from(op.0))?),
        op => match op.small_int_value() {
            Some(value) => StackItem::from(value),
            None => return Err(VmError::InvalidOpcode(op.0)),
        },
    };
    context.evaluation_stack_mut().push(item)
}

fn read_data(context: &mut ExecutionContext, len: usize, limits: &Limits) -> Result<StackItem, VmError> {
    check_item_size(len, limits)?;
    Ok(StackItem::from(context.read_bytes(len)?))
}
