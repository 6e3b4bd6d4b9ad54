//! Scripts and script assembly
//!
//! A `Script` is immutable bytecode plus its lazily computed content hash.
//! Frames share one `Rc<Script>`, so the hash is computed at most once per
//! loaded script no matter how many frames run it.

pub mod builder;
pub mod hash;

pub use builder::ScriptBuilder;
pub use hash::{hash160, hash256, sha256, ScriptHash};

use std::cell::OnceCell;
use std::fmt;

pub struct Script {
    bytes: Box<[u8]>,
    hash: OnceCell<ScriptHash>,
}

impl Script {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Script {
            bytes: bytes.into(),
            hash: OnceCell::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hash160 of the bytes, computed on first use
    pub fn hash(&self) -> ScriptHash {
        *self.hash.get_or_init(|| hash160(&self.bytes))
    }

    pub fn is_hash_computed(&self) -> bool {
        self.hash.get().is_some()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("len", &self.bytes.len())
            .field("hash", &self.hash.get().map(|h| crate::errors::to_hex(h)))
            .finish()
    }
}
