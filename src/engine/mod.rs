//! # Execution engine
//!
//! The engine is the host side of the VM. It holds:
//! - the invocation stack (top = current frame) and the result stack
//! - the VM state, gas accounting and the last fault
//! - the interop cache and the script cache
//! - the collaborators: script table, interop service, message provider,
//!   logger and interpreter
//!
//! ## State machine
//!
//! `None` → (`step_into` / `execute`) → `Halt` | `Fault` | `Break`
//!
//! `Halt` and `Fault` end the run. `Break` is a pause: stepping or
//! `execute` resumes from it. `clean` resets the engine to `None` so the same
//! instance can run another script.
//!
//! An engine is single-threaded (`!Send`): stack items are `Rc`-based. Run
//! one engine per thread and share collaborators through `Arc`.

pub mod builder;
pub mod exec_loop;
pub mod protocols;

#[cfg(test)]
mod tests;

pub use builder::{EngineBuilder, EngineOptions};
pub use protocols::{InMemoryScriptTable, MessageProvider, ScriptTable};

use crate::context::ExecutionContext;
use crate::errors::{to_hex, VmError};
use crate::interop::{InteropCache, InteropObject, InteropService};
use crate::interpreter::Interpreter;
use crate::logging::{LogEvent, LogVerbosity, Logger, StackKind};
use crate::script::{Script, ScriptHash};
use crate::settings::EngineSettings;
use crate::stack::{Stack, StackObserver, StackOp};
use crate::stack_item::{collect_cycles, StackItem};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/* ===================== VM State ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmState {
    /// Constructed or cleaned, or running
    None,
    /// Every frame returned
    Halt,
    /// An instruction failed; frames are kept for inspection
    Fault,
    /// Paused after a step or at a breakpoint
    Break,
}

impl VmState {
    /// Halt and Fault end the current run
    pub fn is_terminal(self) -> bool {
        matches!(self, VmState::Halt | VmState::Fault)
    }
}

/* ===================== Engine ===================== */

pub struct ExecutionEngine {
    invocation_stack: Vec<ExecutionContext>,
    result_stack: Stack,
    state: VmState,
    fault: Option<VmError>,

    gas_consumed: u64,
    gas_limit: u64,
    iteration: u32,

    interop_cache: InteropCache,
    script_cache: Vec<Rc<Script>>,
    breakpoints: HashSet<(ScriptHash, usize)>,

    /// Most recent message, tagged with the iteration it was fetched for
    message: Option<(u32, Option<Vec<u8>>)>,

    settings: EngineSettings,
    script_table: Option<Arc<dyn ScriptTable>>,
    interop_service: Option<Arc<InteropService>>,
    message_provider: Option<Arc<dyn MessageProvider>>,
    logger: Option<Rc<Logger>>,
    interpreter: Arc<dyn Interpreter + Send + Sync>,
}

impl ExecutionEngine {
    /// Engine with default settings, no collaborators and the reference interpreter
    pub fn new() -> Self {
        EngineOptions::default().into_engine()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn from_options(options: EngineOptions) -> Self {
        let gas_limit = options.settings.default_gas.unwrap_or(u64::MAX);
        let mut engine = ExecutionEngine {
            invocation_stack: Vec::new(),
            result_stack: Stack::new(),
            state: VmState::None,
            fault: None,
            gas_consumed: 0,
            gas_limit,
            iteration: 0,
            interop_cache: InteropCache::new(),
            script_cache: Vec::new(),
            breakpoints: HashSet::new(),
            message: None,
            settings: options.settings,
            script_table: options.script_table,
            interop_service: options.interop_service,
            message_provider: options.message_provider,
            logger: options.logger,
            interpreter: options.interpreter,
        };
        let observer = engine.stack_observer(StackKind::Result);
        engine.result_stack.set_observer(observer);
        engine
    }

    /* ---------- State ---------- */

    pub fn state(&self) -> VmState {
        self.state
    }

    /// Why the run faulted, if it did
    pub fn fault_reason(&self) -> Option<&VmError> {
        self.fault.as_ref()
    }

    pub(crate) fn fault(&mut self, error: VmError) {
        tracing::debug!(
            error = %error,
            ip = ?self.current_context().map(|c| c.instruction_pointer()),
            "execution faulted"
        );
        self.fault = Some(error);
        self.state = VmState::Fault;
    }

    pub(crate) fn set_state(&mut self, state: VmState) {
        self.state = state;
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Reset for another run, keeping caches and collaborators
    ///
    /// Frames are disposed and the result stack is emptied, then containers
    /// kept alive only by reference cycles are reclaimed. The interop cache
    /// and the script cache survive, so scripts loaded earlier keep their
    /// indexes.
    pub fn clean(&mut self, iteration: u32) {
        while let Some(mut context) = self.pop_context() {
            context.dispose();
        }
        self.result_stack.clear();
        collect_cycles();
        self.state = VmState::None;
        self.fault = None;
        self.gas_consumed = 0;
        self.gas_limit = self.settings.default_gas.unwrap_or(u64::MAX);
        self.iteration = iteration;
        self.message = None;
    }

    /* ---------- Gas ---------- */

    pub fn gas_consumed(&self) -> u64 {
        self.gas_consumed
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Raise the gas limit of the current run
    pub fn increase_gas(&mut self, amount: u64) {
        self.gas_limit = self.gas_limit.saturating_add(amount);
    }

    pub(crate) fn set_gas_budget(&mut self, budget: u64) {
        self.gas_limit = self.gas_consumed.saturating_add(budget);
    }

    /// Charge gas; false (and no charge) if it would exceed the limit
    pub(crate) fn charge_gas(&mut self, cost: u64) -> bool {
        let consumed = self.gas_consumed.saturating_add(cost);
        if consumed > self.gas_limit {
            return false;
        }
        self.gas_consumed = consumed;
        true
    }

    /* ---------- Frames ---------- */

    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    pub fn invocation_depth(&self) -> usize {
        self.invocation_stack.len()
    }

    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    /// The frame below the current one
    pub fn calling_context(&self) -> Option<&ExecutionContext> {
        let depth = self.invocation_stack.len();
        depth.checked_sub(2).map(|i| &self.invocation_stack[i])
    }

    /// The bottom frame
    pub fn entry_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.first()
    }

    pub fn result_stack(&self) -> &Stack {
        &self.result_stack
    }

    pub(crate) fn result_stack_mut(&mut self) -> &mut Stack {
        &mut self.result_stack
    }

    /// A new frame whose stacks report to the logger when it asks for them
    pub(crate) fn new_context(&self, script: Rc<Script>, rvcount: i32) -> ExecutionContext {
        let mut evaluation = Stack::new();
        evaluation.set_observer(self.stack_observer(StackKind::Evaluation));
        let mut alt = Stack::new();
        alt.set_observer(self.stack_observer(StackKind::Alt));
        ExecutionContext::with_stacks(script, rvcount, evaluation, alt)
    }

    pub(crate) fn push_context(&mut self, context: ExecutionContext) -> Result<(), VmError> {
        if self.invocation_stack.len() >= self.settings.limits.max_invocation_stack_size {
            return Err(VmError::LimitExceeded("invocation stack"));
        }
        self.invocation_stack.push(context);
        self.log_context_change(self.invocation_stack.len() - 1, StackOp::Push);
        Ok(())
    }

    pub(crate) fn pop_context(&mut self) -> Option<ExecutionContext> {
        let context = self.invocation_stack.pop()?;
        if self.logs(LogVerbosity::EXECUTION_CONTEXT_STACK_CHANGES) {
            self.emit(LogEvent::ExecutionContextChanged {
                script_hash: context.script_hash(),
                index: self.invocation_stack.len(),
                op: StackOp::Pop,
            });
        }
        Some(context)
    }

    /* ---------- Script Loading ---------- */

    /// Push a new frame running `script`
    ///
    /// Returns the script's cache index, or `None` if the bytes are empty or
    /// the invocation stack is full. Identical bytes share one cache entry.
    pub fn load_script(&mut self, script: &[u8], rvcount: i32) -> Option<usize> {
        if script.is_empty() {
            return None;
        }
        let index = self.cache_script(script);
        self.load_cached_script(index, rvcount).then_some(index)
    }

    /// Push a new frame for a previously loaded script
    ///
    /// Returns false, with no state change, if the index is unknown.
    pub fn load_cached_script(&mut self, index: usize, rvcount: i32) -> bool {
        let Some(script) = self.script_cache.get(index).cloned() else {
            return false;
        };
        let context = self.new_context(script, rvcount);
        match self.push_context(context) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, index, "script not loaded");
                false
            }
        }
    }

    /// Resolve a script through the script table and push a frame for it
    pub fn load_script_by_hash(&mut self, hash: &ScriptHash, is_dynamic: bool, rvcount: i32) -> Result<(), VmError> {
        let script = self.resolve_script(hash, is_dynamic)?;
        let context = self.new_context(script, rvcount);
        self.push_context(context)
    }

    /// Ask the script table for `hash` and cache the result
    pub(crate) fn resolve_script(&mut self, hash: &ScriptHash, is_dynamic: bool) -> Result<Rc<Script>, VmError> {
        let bytes = self
            .script_table
            .as_ref()
            .and_then(|table| table.get_script(hash, is_dynamic))
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| VmError::ScriptNotFound(to_hex(hash)))?;
        let index = self.cache_script(&bytes);
        Ok(self.script_cache[index].clone())
    }

    fn cache_script(&mut self, bytes: &[u8]) -> usize {
        if let Some(index) = self.script_cache.iter().position(|s| s.bytes() == bytes) {
            return index;
        }
        self.script_cache.push(Rc::new(Script::new(bytes)));
        self.script_cache.len() - 1
    }

    pub fn cached_script(&self, index: usize) -> Option<&Rc<Script>> {
        self.script_cache.get(index)
    }

    /* ---------- Interop ---------- */

    /// Dispatch a syscall by its raw name
    ///
    /// False when there is no interop service, the name is not UTF-8, or the
    /// service reports failure.
    pub fn invoke_syscall(&mut self, name: &[u8]) -> bool {
        let Some(service) = self.interop_service.clone() else {
            tracing::debug!("syscall without an interop service");
            return false;
        };
        let Ok(name) = std::str::from_utf8(name) else {
            tracing::debug!(name = %to_hex(name), "syscall name is not UTF-8");
            return false;
        };
        service.invoke(name, self)
    }

    /// Wrap a host object, reusing its key if it was wrapped before
    pub fn create_interop(&mut self, object: Rc<dyn InteropObject>) -> StackItem {
        StackItem::Interop(self.interop_cache.wrap(object))
    }

    pub fn interop_cache(&self) -> &InteropCache {
        &self.interop_cache
    }

    pub fn interop_cache_mut(&mut self) -> &mut InteropCache {
        &mut self.interop_cache
    }

    /// Message for the current iteration
    ///
    /// The provider is asked at most once per iteration; only the latest
    /// buffer is kept.
    pub fn message(&mut self) -> Option<&[u8]> {
        let iteration = self.iteration;
        let fresh = matches!(&self.message, Some((cached, _)) if *cached == iteration);
        if !fresh {
            let fetched = self
                .message_provider
                .as_ref()
                .and_then(|provider| provider.get_message(iteration));
            self.message = Some((iteration, fetched));
        }
        self.message.as_ref().and_then(|(_, message)| message.as_deref())
    }

    /* ---------- Breakpoints ---------- */

    pub fn add_breakpoint(&mut self, script_hash: ScriptHash, position: usize) {
        self.breakpoints.insert((script_hash, position));
    }

    pub fn remove_breakpoint(&mut self, script_hash: &ScriptHash, position: usize) -> bool {
        self.breakpoints.remove(&(*script_hash, position))
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// True when the current frame is positioned on a breakpoint
    pub(crate) fn at_breakpoint(&self) -> bool {
        if self.breakpoints.is_empty() {
            return false;
        }
        self.current_context()
            .map(|c| self.breakpoints.contains(&(c.script_hash(), c.instruction_pointer())))
            .unwrap_or(false)
    }

    /* ---------- Logging ---------- */

    pub fn logger(&self) -> Option<&Rc<Logger>> {
        self.logger.as_ref()
    }

    #[inline]
    pub(crate) fn logs(&self, flag: LogVerbosity) -> bool {
        match &self.logger {
            Some(logger) => logger.is_enabled(flag),
            None => false,
        }
    }

    pub(crate) fn emit(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            logger.emit(event);
        }
    }

    fn log_context_change(&self, index: usize, op: StackOp) {
        if !self.logs(LogVerbosity::EXECUTION_CONTEXT_STACK_CHANGES) {
            return;
        }
        if let Some(context) = self.invocation_stack.get(index) {
            self.emit(LogEvent::ExecutionContextChanged {
                script_hash: context.script_hash(),
                index,
                op,
            });
        }
    }

    fn stack_observer(&self, stack: StackKind) -> Option<StackObserver> {
        let logger = self.logger.as_ref()?;
        if !logger.is_enabled(stack.verbosity()) {
            return None;
        }
        let logger = logger.clone();
        Some(Rc::new(move |item: &StackItem, index: usize, op: StackOp| {
            logger.emit(LogEvent::StackChanged {
                stack,
                item: item.clone(),
                index,
                op,
            })
        }))
    }

    /* ---------- Output ---------- */

    /// Result stack as JSON, bottom item first
    pub fn result_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.result_stack.iter().map(StackItem::to_json).collect())
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        for context in self.invocation_stack.iter_mut() {
            context.dispose();
        }
        self.result_stack.dispose();
        collect_cycles();
        self.interop_cache.release_all();
    }
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("state", &self.state)
            .field("invocation_depth", &self.invocation_stack.len())
            .field("result_stack", &self.result_stack)
            .field("gas_consumed", &self.gas_consumed)
            .field("gas_limit", &self.gas_limit)
            .field("iteration", &self.iteration)
            .field("fault", &self.fault)
            .finish()
    }
}
