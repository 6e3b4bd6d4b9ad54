//! Syscall dispatch
//!
//! `InteropService` maps syscall names to handlers. One handler can be
//! registered under several names. Handlers see the engine as their only
//! interface to VM state, normally through the current frame's evaluation
//! stack.
//!
//! `invoke` is the failure boundary: an unregistered name, an `Err`, a
//! `false` result, or a panic inside the handler all come back as `false`.

use crate::engine::ExecutionEngine;
use crate::errors::VmError;
use crate::stack_item::StackItem;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A syscall handler
pub type InteropHandler = Arc<dyn Fn(&mut ExecutionEngine) -> Result<bool, VmError> + Send + Sync>;

/* ===================== Standard Handler Names ===================== */

pub const GET_EXECUTING_SCRIPT_HASH: &str = "System.ExecutionEngine.GetExecutingScriptHash";
pub const GET_EXECUTING_SCRIPT_HASH_LEGACY: &str = "Neo.ExecutionEngine.GetExecutingScriptHash";
pub const GET_CALLING_SCRIPT_HASH: &str = "System.ExecutionEngine.GetCallingScriptHash";
pub const GET_ENTRY_SCRIPT_HASH: &str = "System.ExecutionEngine.GetEntryScriptHash";
pub const GET_MESSAGE: &str = "System.ExecutionEngine.GetMessage";

/* ===================== Registry ===================== */

#[derive(Clone, Default)]
pub struct InteropService {
    handlers: HashMap<String, InteropHandler>,
}

impl InteropService {
    /// Create an empty registry
    pub fn new() -> Self {
        InteropService::default()
    }

    /// Create a registry with the execution-engine introspection handlers
    pub fn with_standard_handlers() -> Self {
        let mut service = InteropService::new();
        service.register_aliases(
            &[GET_EXECUTING_SCRIPT_HASH, GET_EXECUTING_SCRIPT_HASH_LEGACY],
            get_executing_script_hash,
        );
        service.register(GET_CALLING_SCRIPT_HASH, get_calling_script_hash);
        service.register(GET_ENTRY_SCRIPT_HASH, get_entry_script_hash);
        service.register(GET_MESSAGE, get_message);
        service
    }

    /// Register a handler under one name, replacing any previous handler
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut ExecutionEngine) -> Result<bool, VmError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    /// Register one handler under several names
    pub fn register_aliases<F>(&mut self, names: &[&str], handler: F)
    where
        F: Fn(&mut ExecutionEngine) -> Result<bool, VmError> + Send + Sync + 'static,
    {
        let handler: InteropHandler = Arc::new(handler);
        for name in names {
            self.handlers.insert((*name).to_string(), handler.clone());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler registered under `name`
    ///
    /// Returns false if the name is unknown or the handler fails in any way.
    pub fn invoke(&self, name: &str, engine: &mut ExecutionEngine) -> bool {
        let Some(handler) = self.handlers.get(name) else {
            tracing::debug!(syscall = name, "syscall not registered");
            return false;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(engine))) {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(syscall = name, error = %err, "syscall handler failed");
                false
            }
            Err(_) => {
                tracing::warn!(syscall = name, "syscall handler panicked");
                false
            }
        }
    }
}

impl fmt::Debug for InteropService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("InteropService")
            .field("handlers", &names)
            .finish()
    }
}

/* ===================== Standard Handlers ===================== */

fn push_hash(engine: &mut ExecutionEngine, hash: [u8; 20]) -> Result<bool, VmError> {
    let context = engine.current_context_mut().ok_or(VmError::NoContext)?;
    context
        .evaluation_stack_mut()
        .push(StackItem::from(&hash[..]))?;
    Ok(true)
}

fn get_executing_script_hash(engine: &mut ExecutionEngine) -> Result<bool, VmError> {
    let hash = engine
        .current_context()
        .ok_or(VmError::NoContext)?
        .script_hash();
    push_hash(engine, hash)
}

fn get_calling_script_hash(engine: &mut ExecutionEngine) -> Result<bool, VmError> {
    let Some(caller) = engine.calling_context() else {
        return Ok(false);
    };
    let hash = caller.script_hash();
    push_hash(engine, hash)
}

fn get_entry_script_hash(engine: &mut ExecutionEngine) -> Result<bool, VmError> {
    let hash = engine
        .entry_context()
        .ok_or(VmError::NoContext)?
        .script_hash();
    push_hash(engine, hash)
}

fn get_message(engine: &mut ExecutionEngine) -> Result<bool, VmError> {
    let Some(message) = engine.message().map(|m| StackItem::from(m)) else {
        return Ok(false);
    };
    let context = engine.current_context_mut().ok_or(VmError::NoContext)?;
    context.evaluation_stack_mut().push(message)?;
    Ok(true)
}
