//! Typed extraction from stack items
//!
//! `FromStackItem` backs `Stack::pop_typed` and `Stack::peek_typed`. The match
//! is on the variant tag only; no value conversion happens here, so asking for
//! a `BigInt` when the top item is a Boolean is a type mismatch.

use super::{ArrayItem, MapItem, StackItem, StackItemType, StructItem};
use crate::errors::VmError;
use crate::interop::InteropHandle;
use num_bigint::BigInt;
use std::rc::Rc;

pub trait FromStackItem: Sized {
    /// Extract by reference, without consuming the item
    fn from_item(item: &StackItem) -> Result<Self, VmError>;
}

fn mismatch<T>(expected: StackItemType, found: &StackItem) -> Result<T, VmError> {
    Err(VmError::TypeMismatch {
        expected: expected.name(),
        found: found.item_type().name(),
    })
}

impl FromStackItem for StackItem {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        Ok(item.clone())
    }
}

impl FromStackItem for BigInt {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        match item {
            StackItem::Integer(value) => Ok(value.clone()),
            other => mismatch(StackItemType::Integer, other),
        }
    }
}

impl FromStackItem for bool {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        match item {
            StackItem::Boolean(value) => Ok(*value),
            other => mismatch(StackItemType::Boolean, other),
        }
    }
}

impl FromStackItem for Rc<[u8]> {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        match item {
            StackItem::ByteString(bytes) => Ok(bytes.clone()),
            other => mismatch(StackItemType::ByteString, other),
        }
    }
}

impl FromStackItem for ArrayItem {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        match item {
            StackItem::Array(array) => Ok(array.clone()),
            other => mismatch(StackItemType::Array, other),
        }
    }
}

impl FromStackItem for StructItem {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        match item {
            StackItem::Struct(s) => Ok(s.clone()),
            other => mismatch(StackItemType::Struct, other),
        }
    }
}

impl FromStackItem for MapItem {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        match item {
            StackItem::Map(map) => Ok(map.clone()),
            other => mismatch(StackItemType::Map, other),
        }
    }
}

impl FromStackItem for InteropHandle {
    fn from_item(item: &StackItem) -> Result<Self, VmError> {
        match item {
            StackItem::Interop(handle) => Ok(handle.clone()),
            other => mismatch(StackItemType::Interop, other),
        }
    }
}
