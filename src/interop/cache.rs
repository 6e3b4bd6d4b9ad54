//! Identity-preserving interop object arena
//!
//! Keys are slot indexes. A released slot is tombstoned (`None`) and never
//! reused, so a stale key can be detected instead of silently resolving to a
//! different object. Lookup by identity is a linear scan and entries live
//! until the owning engine is torn down.

use super::{same_object, InteropHandle, InteropObject};
use crate::errors::VmError;
use std::cell::Cell;
use std::rc::Rc;

struct Slot {
    object: Option<Rc<dyn InteropObject>>,
    /// Shared with every handle wrapped from this slot
    released: Rc<Cell<bool>>,
}

#[derive(Default)]
pub struct InteropCache {
    slots: Vec<Slot>,
}

impl InteropCache {
    pub fn new() -> Self {
        InteropCache::default()
    }

    /// Register an object, returning the existing key if it is already cached
    pub fn register(&mut self, object: Rc<dyn InteropObject>) -> usize {
        let existing = self.slots.iter().position(|slot| match &slot.object {
            Some(cached) => same_object(cached, &object),
            None => false,
        });
        if let Some(key) = existing {
            return key;
        }
        let key = self.slots.len();
        self.slots.push(Slot {
            object: Some(object),
            released: Rc::new(Cell::new(false)),
        });
        key
    }

    /// Register an object and wrap it as a handle
    pub fn wrap(&mut self, object: Rc<dyn InteropObject>) -> InteropHandle {
        let key = self.register(object.clone());
        let released = self.slots[key].released.clone();
        InteropHandle::new(key, object, released)
    }

    pub fn lookup(&self, key: usize) -> Result<Rc<dyn InteropObject>, VmError> {
        match self.slots.get(key) {
            Some(Slot { object: Some(object), .. }) => Ok(object.clone()),
            Some(_) => Err(VmError::InvalidState("interop object already released")),
            None => Err(VmError::UnknownInteropKey(key)),
        }
    }

    /// Release one entry; a second release of the same key is a no-op
    pub fn release(&mut self, key: usize) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) => slot.release(),
            None => false,
        }
    }

    /// Release every live entry exactly once
    pub fn release_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.release();
        }
    }

    /// Number of slots ever assigned, including released ones
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.object.is_some()).count()
    }
}

impl Slot {
    fn release(&mut self) -> bool {
        let Some(object) = self.object.take() else {
            return false;
        };
        self.released.set(true);
        object.dispose();
        true
    }
}
