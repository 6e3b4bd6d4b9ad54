//! Container stack items
//!
//! `ArrayItem` and `StructItem` share one storage layout: a reference-counted,
//! interior-mutable vector. Cloning the Rust handle shares the container; the
//! value-level copy lives in `StackItem::clone_item`.
//!
//! `MapItem` keeps insertion order and looks keys up with stack item equality.
//! Only primitive items may be used as keys.
//!
//! Dropping the last handle to a container releases its whole subtree from a
//! worklist, so arbitrarily deep nesting never recurses. Debug output stops
//! at `MAX_DEBUG_DEPTH` levels.

use super::cycles;
use super::StackItem;
use crate::errors::VmError;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

pub(super) type ArrayCell = RefCell<Vec<StackItem>>;
pub(super) type MapCell = RefCell<Vec<(StackItem, StackItem)>>;

/// Container levels printed by `Debug` before eliding the rest
pub const MAX_DEBUG_DEPTH: usize = 32;

thread_local! {
    static DEBUG_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Run `body` one container level deeper, or print `elided` past the limit
fn nested_fmt(
    f: &mut fmt::Formatter<'_>,
    elided: &str,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    let depth = DEBUG_DEPTH.with(Cell::get);
    if depth >= MAX_DEBUG_DEPTH {
        return f.write_str(elided);
    }
    DEBUG_DEPTH.with(|d| d.set(depth + 1));
    let result = body(f);
    DEBUG_DEPTH.with(|d| d.set(depth));
    result
}

/// Drop a batch of items without recursing into nested containers
fn release_iteratively(mut pending: Vec<StackItem>) {
    while let Some(item) = pending.pop() {
        match &item {
            StackItem::Array(array) => array.drain_if_unique(&mut pending),
            StackItem::Struct(s) => s.as_array().drain_if_unique(&mut pending),
            StackItem::Map(map) => map.drain_if_unique(&mut pending),
            _ => {}
        }
        // `item` is empty by now, so its own drop does not descend
    }
}

/* ===================== Array ===================== */

/// Shared, mutable sequence of stack items
#[derive(Clone)]
pub struct ArrayItem(pub(super) Rc<ArrayCell>);

impl ArrayItem {
    pub fn new(items: Vec<StackItem>) -> Self {
        let cell = Rc::new(RefCell::new(items));
        cycles::track_array(&cell);
        ArrayItem(cell)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Borrow the element list
    ///
    /// Panics if called while the same container is being mutated, which the
    /// single-threaded engine never does.
    pub fn items(&self) -> Ref<'_, Vec<StackItem>> {
        self.0.borrow()
    }

    /// Copy out the element handles
    pub fn to_vec(&self) -> Vec<StackItem> {
        self.0.borrow().clone()
    }

    pub fn get(&self, index: usize) -> Result<StackItem, VmError> {
        let items = self.0.borrow();
        items
            .get(index)
            .cloned()
            .ok_or(VmError::IndexOutOfRange {
                index,
                count: items.len(),
            })
    }

    pub fn set(&self, index: usize, item: StackItem) -> Result<(), VmError> {
        let mut items = self.0.borrow_mut();
        let count = items.len();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(VmError::IndexOutOfRange { index, count }),
        }
    }

    pub fn push(&self, item: StackItem) {
        self.0.borrow_mut().push(item);
    }

    pub fn remove(&self, index: usize) -> Result<StackItem, VmError> {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            return Err(VmError::IndexOutOfRange {
                index,
                count: items.len(),
            });
        }
        Ok(items.remove(index))
    }

    pub fn reverse(&self) {
        self.0.borrow_mut().reverse();
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// True when both handles point at the same container
    pub fn ptr_eq(&self, other: &ArrayItem) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    /// Move the elements out if this is the last handle
    fn drain_if_unique(&self, pending: &mut Vec<StackItem>) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        if let Ok(mut items) = self.0.try_borrow_mut() {
            pending.append(&mut items);
        }
    }
}

impl Default for ArrayItem {
    fn default() -> Self {
        ArrayItem::new(Vec::new())
    }
}

impl Drop for ArrayItem {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.drain_if_unique(&mut pending);
        if !pending.is_empty() {
            release_iteratively(pending);
        }
    }
}

impl From<Vec<StackItem>> for ArrayItem {
    fn from(items: Vec<StackItem>) -> Self {
        ArrayItem::new(items)
    }
}

impl fmt::Debug for ArrayItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => nested_fmt(f, "[..]", |f| f.debug_list().entries(items.iter()).finish()),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

/* ===================== Struct ===================== */

/// Value-semantics sequence; same storage as `ArrayItem`
#[derive(Clone, Default)]
pub struct StructItem(ArrayItem);

impl StructItem {
    pub fn new(items: Vec<StackItem>) -> Self {
        StructItem(ArrayItem::new(items))
    }

    pub fn as_array(&self) -> &ArrayItem {
        &self.0
    }

    pub fn ptr_eq(&self, other: &StructItem) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Deref for StructItem {
    type Target = ArrayItem;

    fn deref(&self) -> &ArrayItem {
        &self.0
    }
}

impl From<Vec<StackItem>> for StructItem {
    fn from(items: Vec<StackItem>) -> Self {
        StructItem::new(items)
    }
}

impl fmt::Debug for StructItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Struct")?;
        self.0.fmt(f)
    }
}

/* ===================== Map ===================== */

/// Shared, mutable, insertion-ordered key/value collection
#[derive(Clone)]
pub struct MapItem(pub(super) Rc<MapCell>);

impl MapItem {
    pub fn new() -> Self {
        MapItem::from_entries(Vec::new())
    }

    /// Build from entries whose keys are already known to be primitive and distinct
    pub(crate) fn from_entries(entries: Vec<(StackItem, StackItem)>) -> Self {
        let cell = Rc::new(RefCell::new(entries));
        cycles::track_map(&cell);
        MapItem(cell)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, key: &StackItem) -> Option<StackItem> {
        self.0
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn contains_key(&self, key: &StackItem) -> bool {
        self.0.borrow().iter().any(|(k, _)| k == key)
    }

    /// Insert or replace; returns the previous value for the key
    pub fn insert(&self, key: StackItem, value: StackItem) -> Result<Option<StackItem>, VmError> {
        if !key.is_primitive() {
            return Err(VmError::InvalidMapKey(key.item_type().name()));
        }
        let mut entries = self.0.borrow_mut();
        if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
            return Ok(Some(std::mem::replace(&mut entry.1, value)));
        }
        entries.push((key, value));
        Ok(None)
    }

    pub fn remove(&self, key: &StackItem) -> Option<StackItem> {
        let mut entries = self.0.borrow_mut();
        let pos = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(pos).1)
    }

    pub fn keys(&self) -> Vec<StackItem> {
        self.0.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<StackItem> {
        self.0.borrow().iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(StackItem, StackItem)> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &MapItem) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    fn drain_if_unique(&self, pending: &mut Vec<StackItem>) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        if let Ok(mut entries) = self.0.try_borrow_mut() {
            for (key, value) in entries.drain(..) {
                pending.push(key);
                pending.push(value);
            }
        }
    }
}

impl Default for MapItem {
    fn default() -> Self {
        MapItem::new()
    }
}

impl Drop for MapItem {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.drain_if_unique(&mut pending);
        if !pending.is_empty() {
            release_iteratively(pending);
        }
    }
}

impl fmt::Debug for MapItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entries) => nested_fmt(f, "{..}", |f| {
                f.debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, v)))
                    .finish()
            }),
            Err(_) => f.write_str("{<borrowed>}"),
        }
    }
}
