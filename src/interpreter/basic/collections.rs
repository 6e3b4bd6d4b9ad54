//! Arrays, structs and maps
//!
//! Struct values stored into a container are copied with `clone_item`, so
//! a struct never aliases one held elsewhere.

use super::{pop_index, to_index};
use crate::context::ExecutionContext;
use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::settings::Limits;
use crate::stack::Stack;
use crate::stack_item::{ArrayItem, MapItem, StackItem};

pub(super) fn execute(context: &mut ExecutionContext, op: OpCode, limits: &Limits) -> Result<(), VmError> {
    let eval = context.evaluation_stack_mut();

    match op {
        OpCode::ARRAYSIZE => {
            let item = eval.pop()?;
            let size = match &item {
                StackItem::Array(array) => array.len(),
                StackItem::Struct(s) => s.len(),
                StackItem::Map(map) => map.len(),
                other => other.to_byte_array()?.len(),
            };
            eval.push(StackItem::from(size))
        }
        OpCode::PACK => {
            let size = pop_index(eval)?;
            if size > limits.max_array_size {
                return Err(VmError::LimitExceeded("array size"));
            }
            let mut items = Vec::with_capacity(size);
            for _ in 0..size {
                items.push(eval.pop()?);
            }
            eval.push(StackItem::new_array(items))
        }
        OpCode::UNPACK => {
            let item = eval.pop()?;
            let sequence = as_sequence(&item)?;
            let items = sequence.to_vec();
            for child in items.iter().rev() {
                eval.push(child.clone())?;
            }
            eval.push(StackItem::from(items.len()))
        }
        OpCode::PICKITEM => {
            let key = eval.pop()?;
            let collection = eval.pop()?;
            let item = match &collection {
                StackItem::Map(map) => map
                    .get(&key)
                    .ok_or_else(|| VmError::InvalidArgument(format!("key {:?} not found", key)))?,
                other => as_sequence(other)?.get(to_index(&key.to_integer()?)?)?,
            };
            eval.push(item)
        }
        OpCode::SETITEM => {
            let value = owned_value(eval.pop()?);
            let key = eval.pop()?;
            let collection = eval.pop()?;
            match &collection {
                StackItem::Map(map) => insert_entry(map, key, value, limits),
                other => as_sequence(other)?.set(to_index(&key.to_integer()?)?, value),
            }
        }
        OpCode::NEWARRAY | OpCode::NEWSTRUCT => {
            let items = new_sequence(eval, limits)?;
            let item = if op == OpCode::NEWARRAY {
                StackItem::new_array(items)
            } else {
                StackItem::new_struct(items)
            };
            eval.push(item)
        }
        OpCode::NEWMAP => eval.push(StackItem::new_map()),
        OpCode::APPEND => {
            let value = owned_value(eval.pop()?);
            let collection = eval.pop()?;
            let sequence = as_sequence(&collection)?;
            if sequence.len() >= limits.max_array_size {
                return Err(VmError::LimitExceeded("array size"));
            }
            sequence.push(value);
            Ok(())
        }
        OpCode::REVERSE => {
            let collection = eval.pop()?;
            as_sequence(&collection)?.reverse();
            Ok(())
        }
        OpCode::REMOVE => {
            let key = eval.pop()?;
            let collection = eval.pop()?;
            match &collection {
                StackItem::Map(map) => {
                    map.remove(&key);
                    Ok(())
                }
                other => as_sequence(other)?.remove(to_index(&key.to_integer()?)?).map(drop),
            }
        }
        OpCode::HASKEY => {
            let key = eval.pop()?;
            let collection = eval.pop()?;
            let found = match &collection {
                StackItem::Map(map) => map.contains_key(&key),
                other => to_index(&key.to_integer()?)? < as_sequence(other)?.len(),
            };
            eval.push(StackItem::from(found))
        }
        OpCode::KEYS => {
            let collection = eval.pop()?;
            let StackItem::Map(map) = &collection else {
                return Err(type_mismatch("Map", &collection));
            };
            eval.push(StackItem::new_array(map.keys()))
        }
        OpCode::VALUES => {
            let collection = eval.pop()?;
            let values = match &collection {
                StackItem::Map(map) => map.values(),
                other => as_sequence(other)?.to_vec(),
            };
            eval.push(StackItem::new_array(values.into_iter().map(owned_value).collect()))
        }
        _ => Err(VmError::InvalidOpcode(op.0)),
    }
}

fn type_mismatch(expected: &'static str, found: &StackItem) -> VmError {
    VmError::TypeMismatch {
        expected,
        found: found.item_type().name(),
    }
}

/// Arrays and structs share storage; both index the same way
fn as_sequence(item: &StackItem) -> Result<&ArrayItem, VmError> {
    match item {
        StackItem::Array(array) => Ok(array),
        StackItem::Struct(s) => Ok(s.as_array()),
        other => Err(type_mismatch("Array", other)),
    }
}

/// Struct values are copied on store; everything else is shared
fn owned_value(item: StackItem) -> StackItem {
    match item {
        StackItem::Struct(_) => item.clone_item(),
        other => other,
    }
}

fn insert_entry(map: &MapItem, key: StackItem, value: StackItem, limits: &Limits) -> Result<(), VmError> {
    if !map.contains_key(&key) && map.len() >= limits.max_array_size {
        return Err(VmError::LimitExceeded("array size"));
    }
    map.insert(key, value).map(drop)
}

/// NEWARRAY / NEWSTRUCT operand: a count of `false` slots, or an existing sequence to copy
fn new_sequence(stack: &mut Stack, limits: &Limits) -> Result<Vec<StackItem>, VmError> {
    let operand = stack.pop()?;
    if let StackItem::Array(_) | StackItem::Struct(_) = operand {
        return Ok(as_sequence(&operand)?.to_vec());
    }
    let count = to_index(&operand.to_integer()?)?;
    if count > limits.max_array_size {
        return Err(VmError::LimitExceeded("array size"));
    }
    Ok(vec![StackItem::from(false); count])
}
