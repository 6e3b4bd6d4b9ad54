//! Host object interop
//!
//! Host objects cross into the VM as `StackItem::Interop` values. The VM only
//! ever sees a stable integer key; the `InteropCache` maps keys back to the
//! objects and preserves their identity across repeated wrapping.
//!
//! Syscalls reach host code through the `InteropService` name registry.

pub mod cache;
pub mod service;

pub use cache::InteropCache;
pub use service::{InteropHandler, InteropService};

use crate::errors::VmError;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Upcast helper so `dyn InteropObject` can be downcast to its concrete type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An opaque host object that can be wrapped as a stack item
pub trait InteropObject: AsAny + fmt::Debug {
    /// Host-level equality, used when two interop items are compared
    ///
    /// Defaults to identity.
    fn equals(&self, other: &dyn InteropObject) -> bool {
        std::ptr::eq(
            AsAny::as_any(self) as *const dyn Any as *const (),
            AsAny::as_any(other) as *const dyn Any as *const (),
        )
    }

    /// Release host resources; called exactly once by the owning cache
    fn dispose(&self) {}

    /// Short type name for diagnostics
    fn type_name(&self) -> &'static str {
        "InteropInterface"
    }
}

/// A cached host object together with its cache key
///
/// The handle shares a release flag with its cache slot. Once the slot is
/// released, every copy of the handle refuses access to the object.
#[derive(Clone)]
pub struct InteropHandle {
    key: usize,
    object: Rc<dyn InteropObject>,
    released: Rc<Cell<bool>>,
}

impl InteropHandle {
    pub(crate) fn new(key: usize, object: Rc<dyn InteropObject>, released: Rc<Cell<bool>>) -> Self {
        InteropHandle { key, object, released }
    }

    pub fn key(&self) -> usize {
        self.key
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    pub fn object(&self) -> Result<&Rc<dyn InteropObject>, VmError> {
        if self.released.get() {
            return Err(VmError::InvalidState("interop object already released"));
        }
        Ok(&self.object)
    }

    /// Downcast the wrapped object
    pub fn downcast_ref<T: InteropObject>(&self) -> Result<&T, VmError> {
        let object = self.object()?;
        AsAny::as_any(&**object)
            .downcast_ref::<T>()
            .ok_or_else(|| VmError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: object.type_name(),
            })
    }

    /// Same host object, whether or not it has been released
    pub fn ptr_eq(&self, other: &InteropHandle) -> bool {
        same_object(&self.object, &other.object)
    }
}

impl fmt::Debug for InteropHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Interop");
        debug.field("key", &self.key);
        if self.released.get() {
            debug.field("released", &true);
        } else {
            debug.field("object", &self.object);
        }
        debug.finish()
    }
}

/// Identity comparison on the data pointer, ignoring vtables
pub(crate) fn same_object(a: &Rc<dyn InteropObject>, b: &Rc<dyn InteropObject>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}
