//! Splice (CAT, SUBSTR, LEFT, RIGHT, SIZE) and hashing (SHA256, HASH160, HASH256)

use super::{check_item_size, pop_index};
use crate::context::ExecutionContext;
use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::script::{hash160, hash256, sha256};
use crate::settings::Limits;
use crate::stack::Stack;
use crate::stack_item::StackItem;
use std::rc::Rc;

pub(super) fn execute(context: &mut ExecutionContext, op: OpCode, limits: &Limits) -> Result<(), VmError> {
    let eval = context.evaluation_stack_mut();

    let result: StackItem = match op {
        OpCode::CAT => {
            let tail = pop_bytes(eval)?;
            let head = pop_bytes(eval)?;
            check_item_size(head.len() + tail.len(), limits)?;
            let mut joined = head.to_vec();
            joined.extend_from_slice(&tail);
            joined.into()
        }
        OpCode::SUBSTR => {
            let count = pop_index(eval)?;
            let index = pop_index(eval)?;
            let bytes = pop_bytes(eval)?;
            if index > bytes.len() {
                return Err(VmError::IndexOutOfRange {
                    index,
                    count: bytes.len(),
                });
            }
            let end = index.saturating_add(count).min(bytes.len());
            StackItem::from(&bytes[index..end])
        }
        OpCode::LEFT => {
            let count = pop_index(eval)?;
            let bytes = pop_bytes(eval)?;
            StackItem::from(&bytes[..count.min(bytes.len())])
        }
        OpCode::RIGHT => {
            let count = pop_index(eval)?;
            let bytes = pop_bytes(eval)?;
            if count > bytes.len() {
                return Err(VmError::IndexOutOfRange {
                    index: count,
                    count: bytes.len(),
                });
            }
            StackItem::from(&bytes[bytes.len() - count..])
        }
        OpCode::SIZE => {
            let bytes = pop_bytes(eval)?;
            StackItem::from(bytes.len())
        }
        OpCode::SHA256 => StackItem::from(&sha256(&pop_bytes(eval)?)[..]),
        OpCode::HASH160 => StackItem::from(&hash160(&pop_bytes(eval)?)[..]),
        OpCode::HASH256 => StackItem::from(&hash256(&pop_bytes(eval)?)[..]),
        _ => return Err(VmError::InvalidOpcode(op.0)),
    };

    eval.push(result)
}

fn pop_bytes(stack: &mut Stack) -> Result<Rc<[u8]>, VmError> {
    stack.pop()?.to_byte_array()
}
