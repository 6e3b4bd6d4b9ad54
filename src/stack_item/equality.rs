//! Stack item equality
//!
//! One `PartialEq` impl, with behavior chosen per variant:
//! - Integer/Integer and Boolean/Boolean compare decoded values
//! - any other pair of primitives compares canonical byte encodings
//! - Array/Array and Struct/Struct compare elementwise; an Array never equals a Struct
//! - Map compares by reference only
//! - Interop delegates to the host object's `equals`; a released object equals nothing
//!
//! Elementwise comparison walks an explicit worklist, so nesting depth does
//! not grow the call stack. A pair of containers that is already being
//! compared counts as equal, which makes self-referencing arrays terminate.

use super::{ArrayItem, StackItem};
use std::collections::HashSet;

impl PartialEq for StackItem {
    fn eq(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Integer(a), StackItem::Integer(b)) => a == b,
            (StackItem::Boolean(a), StackItem::Boolean(b)) => a == b,
            (StackItem::ByteString(a), StackItem::ByteString(b)) => a == b,

            (StackItem::Array(a), StackItem::Array(b)) => sequences_eq(a, b),
            (StackItem::Struct(a), StackItem::Struct(b)) => sequences_eq(a.as_array(), b.as_array()),

            (StackItem::Map(a), StackItem::Map(b)) => a.ptr_eq(b),

            (StackItem::Interop(a), StackItem::Interop(b)) => match (a.object(), b.object()) {
                (Ok(x), Ok(y)) => a.ptr_eq(b) || x.equals(&**y),
                _ => false,
            },

            (a, b) if a.is_primitive() && b.is_primitive() => {
                match (a.to_byte_array(), b.to_byte_array()) {
                    (Ok(x), Ok(y)) => x == y,
                    _ => false,
                }
            }

            _ => false,
        }
    }
}

fn sequences_eq(a: &ArrayItem, b: &ArrayItem) -> bool {
    let mut visited: HashSet<(*const (), *const ())> = HashSet::new();
    let mut pending = vec![(a.clone(), b.clone())];

    while let Some((x, y)) = pending.pop() {
        if x.ptr_eq(&y) || !visited.insert((x.as_ptr(), y.as_ptr())) {
            continue;
        }
        let (xs, ys) = (x.items(), y.items());
        if xs.len() != ys.len() {
            return false;
        }
        for pair in xs.iter().zip(ys.iter()) {
            match pair {
                (StackItem::Array(p), StackItem::Array(q)) => pending.push((p.clone(), q.clone())),
                (StackItem::Struct(p), StackItem::Struct(q)) => {
                    pending.push((p.as_array().clone(), q.as_array().clone()))
                }
                (p, q) => {
                    if p != q {
                        return false;
                    }
                }
            }
        }
    }
    true
}
