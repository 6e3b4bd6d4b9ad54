//! Runtime stack items
//!
//! `StackItem` is the tagged value every VM stack holds:
//! - Integer, Boolean, ByteString: immutable primitives
//! - Array, Struct: shared sequences, differing only in `clone_item`
//! - Map: shared key/value collection with reference equality
//! - Interop: an opaque host object plus its interop cache key
//!
//! `Clone` on a `StackItem` duplicates the handle, so containers stay shared
//! (this is what `DUP` does). Use `clone_item` for the value-level copy.

pub mod compound;
pub mod convert;
pub mod cycles;
pub mod equality;
pub mod integer;
pub mod json;


pub use compound::{ArrayItem, MapItem, StructItem};
pub use convert::FromStackItem;
pub use cycles::collect_cycles;

use crate::errors::VmError;
use crate::interop::InteropHandle;
use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/* ===================== Item Types ===================== */

/// Variant tag of a stack item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackItemType {
    Integer,
    Boolean,
    ByteString,
    Array,
    Struct,
    Map,
    Interop,
}

impl StackItemType {
    pub fn name(self) -> &'static str {
        match self {
            StackItemType::Integer => "Integer",
            StackItemType::Boolean => "Boolean",
            StackItemType::ByteString => "ByteString",
            StackItemType::Array => "Array",
            StackItemType::Struct => "Struct",
            StackItemType::Map => "Map",
            StackItemType::Interop => "InteropInterface",
        }
    }
}

impl fmt::Display for StackItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/* ===================== Stack Item ===================== */

#[derive(Clone)]
pub enum StackItem {
    Integer(BigInt),
    Boolean(bool),
    ByteString(Rc<[u8]>),
    Array(ArrayItem),
    Struct(StructItem),
    Map(MapItem),
    Interop(InteropHandle),
}

impl StackItem {
    /// Decode an Integer from its canonical byte form
    pub fn integer_from_bytes(bytes: &[u8]) -> StackItem {
        StackItem::Integer(integer::decode(bytes))
    }

    /// Decode a Boolean: empty or all-zero bytes are false
    pub fn boolean_from_bytes(bytes: &[u8]) -> StackItem {
        StackItem::Boolean(bytes.iter().any(|b| *b != 0))
    }

    pub fn new_array(items: Vec<StackItem>) -> StackItem {
        StackItem::Array(ArrayItem::new(items))
    }

    pub fn new_struct(items: Vec<StackItem>) -> StackItem {
        StackItem::Struct(StructItem::new(items))
    }

    pub fn new_map() -> StackItem {
        StackItem::Map(MapItem::new())
    }

    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Interop(_) => StackItemType::Interop,
        }
    }

    /// Integer, Boolean and ByteString
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            StackItem::Integer(_) | StackItem::Boolean(_) | StackItem::ByteString(_)
        )
    }

    /* ---------- Conversions ---------- */

    /// Canonical byte representation
    ///
    /// Containers and interop objects have none.
    pub fn to_byte_array(&self) -> Result<Rc<[u8]>, VmError> {
        match self {
            StackItem::Integer(value) => Ok(integer::encode(value).into()),
            StackItem::Boolean(true) => Ok(Rc::from(&[1u8][..])),
            StackItem::Boolean(false) => Ok(Rc::from(Vec::<u8>::new())),
            StackItem::ByteString(bytes) => Ok(bytes.clone()),
            other => Err(VmError::UnsupportedConversion(other.item_type().name())),
        }
    }

    pub fn to_integer(&self) -> Result<BigInt, VmError> {
        match self {
            StackItem::Integer(value) => Ok(value.clone()),
            StackItem::Boolean(b) => Ok(if *b { BigInt::from(1) } else { BigInt::zero() }),
            StackItem::ByteString(bytes) => Ok(integer::decode(bytes)),
            other => Err(VmError::TypeMismatch {
                expected: "Integer",
                found: other.item_type().name(),
            }),
        }
    }

    /// Truthiness; containers and interop objects are always true
    pub fn to_bool(&self) -> bool {
        match self {
            StackItem::Integer(value) => !value.is_zero(),
            StackItem::Boolean(b) => *b,
            StackItem::ByteString(bytes) => bytes.iter().any(|b| *b != 0),
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) | StackItem::Interop(_) => true,
        }
    }

    /// Length of the byte representation, if there is one
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            StackItem::ByteString(bytes) => Some(bytes.len()),
            StackItem::Boolean(b) => Some(usize::from(*b)),
            StackItem::Integer(value) => Some(integer::encode(value).len()),
            _ => None,
        }
    }

    /* ---------- Clone ---------- */

    /// Value-level copy
    ///
    /// A Struct is copied deeply through nested Structs only: every nested
    /// Struct gets a fresh container, while nested Arrays, Maps and
    /// primitives are shared with the original. Arrays and Maps get a new
    /// container holding the same child handles. Primitives and interop
    /// items are returned as-is.
    pub fn clone_item(&self) -> StackItem {
        match self {
            StackItem::Struct(s) => StackItem::Struct(clone_struct(s)),
            StackItem::Array(a) => StackItem::new_array(a.to_vec()),
            StackItem::Map(m) => StackItem::Map(MapItem::from_entries(m.entries())),
            other => other.clone(),
        }
    }
}

/// Copy a struct and every struct nested in it, without recursing
///
/// A struct reached twice maps to the same copy, so shared or cyclic struct
/// graphs keep their shape.
fn clone_struct(source: &StructItem) -> StructItem {
    let root = StructItem::new(Vec::new());
    let mut copies: HashMap<*const (), StructItem> = HashMap::new();
    copies.insert(source.as_ptr(), root.clone());
    let mut pending = vec![(source.clone(), root.clone())];

    while let Some((from, to)) = pending.pop() {
        for child in from.to_vec() {
            let inner = match child {
                StackItem::Struct(inner) => inner,
                shared => {
                    to.push(shared);
                    continue;
                }
            };
            let copy = match copies.get(&inner.as_ptr()) {
                Some(existing) => existing.clone(),
                None => {
                    let copy = StructItem::new(Vec::new());
                    copies.insert(inner.as_ptr(), copy.clone());
                    pending.push((inner, copy.clone()));
                    copy
                }
            };
            to.push(StackItem::Struct(copy));
        }
    }
    root
}

/* ===================== Constructors ===================== */

impl From<BigInt> for StackItem {
    fn from(value: BigInt) -> Self {
        StackItem::Integer(value)
    }
}

impl From<i64> for StackItem {
    fn from(value: i64) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<i32> for StackItem {
    fn from(value: i32) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<u64> for StackItem {
    fn from(value: u64) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<usize> for StackItem {
    fn from(value: usize) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<bool> for StackItem {
    fn from(value: bool) -> Self {
        StackItem::Boolean(value)
    }
}

impl From<&[u8]> for StackItem {
    fn from(value: &[u8]) -> Self {
        StackItem::ByteString(Rc::from(value))
    }
}

impl From<Vec<u8>> for StackItem {
    fn from(value: Vec<u8>) -> Self {
        StackItem::ByteString(Rc::from(value))
    }
}

impl From<&str> for StackItem {
    fn from(value: &str) -> Self {
        StackItem::ByteString(Rc::from(value.as_bytes()))
    }
}

impl From<ArrayItem> for StackItem {
    fn from(value: ArrayItem) -> Self {
        StackItem::Array(value)
    }
}

impl From<StructItem> for StackItem {
    fn from(value: StructItem) -> Self {
        StackItem::Struct(value)
    }
}

impl From<MapItem> for StackItem {
    fn from(value: MapItem) -> Self {
        StackItem::Map(value)
    }
}

impl From<InteropHandle> for StackItem {
    fn from(value: InteropHandle) -> Self {
        StackItem::Interop(value)
    }
}

impl fmt::Debug for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackItem::Integer(value) => write!(f, "Integer({})", value),
            StackItem::Boolean(value) => write!(f, "Boolean({})", value),
            StackItem::ByteString(bytes) => {
                write!(f, "ByteString(0x{})", crate::errors::to_hex(bytes))
            }
            StackItem::Array(array) => write!(f, "Array{:?}", array),
            StackItem::Struct(s) => s.fmt(f),
            StackItem::Map(map) => write!(f, "Map{:?}", map),
            StackItem::Interop(handle) => handle.fmt(f),
        }
    }
}
