//! Host collaborators
//!
//! The engine calls back into the host through these traits, synchronously
//! and from the engine's own thread. Implementations may be shared by many
//! engines running on different threads, so they must be `Send + Sync` and
//! treat every call as a concurrent read.

use crate::script::{hash160, ScriptHash};
use std::collections::HashMap;

/// Resolves a script hash to bytecode for APPCALL-style instructions
pub trait ScriptTable: Send + Sync {
    /// `is_dynamic_invoke` is true when the hash came from the stack rather
    /// than from the instruction itself
    fn get_script(&self, hash: &ScriptHash, is_dynamic_invoke: bool) -> Option<Vec<u8>>;
}

impl<F> ScriptTable for F
where
    F: Fn(&ScriptHash, bool) -> Option<Vec<u8>> + Send + Sync,
{
    fn get_script(&self, hash: &ScriptHash, is_dynamic_invoke: bool) -> Option<Vec<u8>> {
        self(hash, is_dynamic_invoke)
    }
}

/// Supplies the external message for an iteration
pub trait MessageProvider: Send + Sync {
    fn get_message(&self, iteration: u32) -> Option<Vec<u8>>;
}

impl<F> MessageProvider for F
where
    F: Fn(u32) -> Option<Vec<u8>> + Send + Sync,
{
    fn get_message(&self, iteration: u32) -> Option<Vec<u8>> {
        self(iteration)
    }
}

/* ===================== In-Memory Script Table ===================== */

/// Script table backed by a hash map, keyed by each script's Hash160
#[derive(Debug, Clone)]
pub struct InMemoryScriptTable {
    scripts: HashMap<ScriptHash, Vec<u8>>,
    allow_dynamic: bool,
}

impl InMemoryScriptTable {
    pub fn new() -> Self {
        InMemoryScriptTable {
            scripts: HashMap::new(),
            allow_dynamic: true,
        }
    }

    /// Whether hashes taken from the stack may be resolved
    pub fn allow_dynamic(mut self, allow: bool) -> Self {
        self.allow_dynamic = allow;
        self
    }

    /// Add a script and return its hash
    pub fn insert(&mut self, script: impl Into<Vec<u8>>) -> ScriptHash {
        let script = script.into();
        let hash = hash160(&script);
        self.scripts.insert(hash, script);
        hash
    }

    pub fn contains(&self, hash: &ScriptHash) -> bool {
        self.scripts.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl Default for InMemoryScriptTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptTable for InMemoryScriptTable {
    fn get_script(&self, hash: &ScriptHash, is_dynamic_invoke: bool) -> Option<Vec<u8>> {
        if is_dynamic_invoke && !self.allow_dynamic {
            return None;
        }
        self.scripts.get(hash).cloned()
    }
}
