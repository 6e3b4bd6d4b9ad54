//! Stack collection
//!
//! An ordered container of stack items, indexed from the top (0 = top). Used
//! for evaluation stacks, alt stacks and the result stack.
//!
//! Popped items belong to the caller. The stack keeps no reference to them.
//!
//! An optional observer receives exactly one notification per push, pop,
//! peek, insert, remove and set, plus one `Drop` per item discarded by `clear`
//! or `dispose`. With no observer installed the only cost is an `Option` check.

use crate::errors::VmError;
use crate::stack_item::{FromStackItem, StackItem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Kind of stack mutation or access reported to an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackOp {
    Push,
    Pop,
    Peek,
    TryPeek,
    Insert,
    Remove,
    Set,
    Drop,
}

/// Observer callback: (item, index from top, operation)
pub type StackObserver = Rc<dyn Fn(&StackItem, usize, StackOp)>;

#[derive(Default)]
pub struct Stack {
    items: Vec<StackItem>,
    observer: Option<StackObserver>,
    disposed: bool,
}

impl Stack {
    pub fn new() -> Self {
        Stack::default()
    }

    pub fn with_observer(observer: StackObserver) -> Self {
        Stack {
            items: Vec::new(),
            observer: Some(observer),
            disposed: false,
        }
    }

    pub fn set_observer(&mut self, observer: Option<StackObserver>) {
        self.observer = observer;
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    #[inline]
    fn notify(&self, item: &StackItem, index: usize, op: StackOp) {
        if let Some(observer) = &self.observer {
            observer(item, index, op);
        }
    }

    fn check_live(&self) -> Result<(), VmError> {
        if self.disposed {
            return Err(VmError::InvalidState("stack has been disposed"));
        }
        Ok(())
    }

    /// Translate a top-relative index to a position in `items`
    fn position(&self, index: usize) -> Result<usize, VmError> {
        let count = self.items.len();
        if index >= count {
            return Err(VmError::IndexOutOfRange { index, count });
        }
        Ok(count - 1 - index)
    }

    /* ---------- Size ---------- */

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /* ---------- Push / Pop ---------- */

    pub fn push(&mut self, item: StackItem) -> Result<(), VmError> {
        self.check_live()?;
        self.notify(&item, 0, StackOp::Push);
        self.items.push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<StackItem, VmError> {
        self.check_live()?;
        let item = self.items.pop().ok_or(VmError::StackEmpty)?;
        self.notify(&item, 0, StackOp::Pop);
        Ok(item)
    }

    /// Pop the top item if it has the requested variant
    ///
    /// On a mismatch the stack is left unchanged.
    pub fn pop_typed<T: FromStackItem>(&mut self) -> Result<T, VmError> {
        self.check_live()?;
        let top = self.items.last().ok_or(VmError::StackEmpty)?;
        let value = T::from_item(top)?;
        self.pop()?;
        Ok(value)
    }

    pub fn try_pop(&mut self) -> Option<StackItem> {
        self.pop().ok()
    }

    /* ---------- Peek ---------- */

    pub fn peek(&self, index: usize) -> Result<StackItem, VmError> {
        self.check_live()?;
        let item = self.items[self.position(index)?].clone();
        self.notify(&item, index, StackOp::Peek);
        Ok(item)
    }

    pub fn peek_typed<T: FromStackItem>(&self, index: usize) -> Result<T, VmError> {
        self.check_live()?;
        let item = &self.items[self.position(index)?];
        let value = T::from_item(item)?;
        self.notify(item, index, StackOp::Peek);
        Ok(value)
    }

    pub fn try_peek(&self, index: usize) -> Option<StackItem> {
        if self.disposed {
            return None;
        }
        let item = self.items.get(self.position(index).ok()?)?.clone();
        self.notify(&item, index, StackOp::TryPeek);
        Some(item)
    }

    /* ---------- Random Access ---------- */

    /// Insert so the item ends up at `index` (0 = new top)
    pub fn insert(&mut self, index: usize, item: StackItem) -> Result<(), VmError> {
        self.check_live()?;
        let count = self.items.len();
        if index > count {
            return Err(VmError::IndexOutOfRange { index, count });
        }
        self.notify(&item, index, StackOp::Insert);
        self.items.insert(count - index, item);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<StackItem, VmError> {
        self.check_live()?;
        let pos = self.position(index)?;
        let item = self.items.remove(pos);
        self.notify(&item, index, StackOp::Remove);
        Ok(item)
    }

    pub fn set(&mut self, index: usize, item: StackItem) -> Result<(), VmError> {
        self.check_live()?;
        let pos = self.position(index)?;
        self.notify(&item, index, StackOp::Set);
        self.items[pos] = item;
        Ok(())
    }

    /// Drop every item
    pub fn clear(&mut self) {
        while let Some(item) = self.items.pop() {
            let index = self.items.len();
            self.notify(&item, index, StackOp::Drop);
        }
    }

    /// Push handles to the top `count` items onto `dest`, keeping their order
    ///
    /// `None` copies everything.
    pub fn copy_to(&self, dest: &mut Stack, count: Option<usize>) -> Result<(), VmError> {
        self.check_live()?;
        let count = count.unwrap_or(self.items.len());
        if count > self.items.len() {
            return Err(VmError::IndexOutOfRange {
                index: count,
                count: self.items.len(),
            });
        }
        let start = self.items.len() - count;
        for item in &self.items[start..] {
            dest.push(item.clone())?;
        }
        Ok(())
    }

    /// Move the top `count` items onto `dest`, keeping their order
    pub fn move_to(&mut self, dest: &mut Stack, count: usize) -> Result<(), VmError> {
        self.copy_to(dest, Some(count))?;
        for _ in 0..count {
            self.pop()?;
        }
        Ok(())
    }

    /// Iterate from bottom to top without notifying the observer
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &StackItem> {
        self.items.iter()
    }

    /// Release every item; later use returns `InvalidState`
    ///
    /// Calling this more than once is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.clear();
        self.disposed = true;
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("items", &self.items)
            .field("observed", &self.observer.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}
