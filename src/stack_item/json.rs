//! JSON rendering of stack items for diagnostics and result inspection
//!
//! Shape: `{"type": "<Variant>", "value": ...}`. Integers are decimal strings
//! (they may exceed JSON number range) and byte strings are hex. A container
//! that is reached again while it is still being rendered becomes `null`, as
//! does anything nested deeper than `MAX_JSON_DEPTH`. A released interop item
//! renders as `"released": true` instead of naming its object.

use super::StackItem;
use crate::errors::to_hex;
use serde_json::{json, Value as JsonValue};

/// Container nesting rendered before falling back to `null`
pub const MAX_JSON_DEPTH: usize = 64;

impl StackItem {
    pub fn to_json(&self) -> JsonValue {
        let mut path = Vec::new();
        render(self, &mut path)
    }
}

fn render(item: &StackItem, path: &mut Vec<*const ()>) -> JsonValue {
    let ptr = match item {
        StackItem::Array(a) => Some(a.as_ptr()),
        StackItem::Struct(s) => Some(s.as_ptr()),
        StackItem::Map(m) => Some(m.as_ptr()),
        _ => None,
    };
    if let Some(ptr) = ptr {
        if path.len() >= MAX_JSON_DEPTH || path.contains(&ptr) {
            return JsonValue::Null;
        }
        path.push(ptr);
    }

    let type_name = item.item_type().name();
    let rendered = match item {
        StackItem::Integer(value) => json!({ "type": type_name, "value": value.to_string() }),
        StackItem::Boolean(value) => json!({ "type": type_name, "value": value }),
        StackItem::ByteString(bytes) => json!({ "type": type_name, "value": to_hex(bytes) }),
        StackItem::Array(array) => {
            let children: Vec<JsonValue> = array.to_vec().iter().map(|c| render(c, path)).collect();
            json!({ "type": type_name, "value": children })
        }
        StackItem::Struct(s) => {
            let children: Vec<JsonValue> = s.to_vec().iter().map(|c| render(c, path)).collect();
            json!({ "type": type_name, "value": children })
        }
        StackItem::Map(map) => {
            let entries: Vec<JsonValue> = map
                .entries()
                .iter()
                .map(|(k, v)| json!({ "key": render(k, path), "value": render(v, path) }))
                .collect();
            json!({ "type": type_name, "value": entries })
        }
        StackItem::Interop(handle) => match handle.object() {
            Ok(object) => json!({
                "type": type_name,
                "key": handle.key(),
                "object": object.type_name(),
            }),
            Err(_) => json!({ "type": type_name, "key": handle.key(), "released": true }),
        },
    };

    if ptr.is_some() {
        path.pop();
    }
    rendered
}
