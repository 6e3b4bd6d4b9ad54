//! Execution logging
//!
//! Two layers:
//! - `tracing` carries internal diagnostics (faults, failed syscalls)
//! - `Logger` is the engine-level observer: it receives step events,
//!   invocation stack changes and per-stack changes, filtered by
//!   `LogVerbosity`
//!
//! An engine without a logger never builds an event.

use crate::context::ContextSnapshot;
use crate::script::ScriptHash;
use crate::stack::StackOp;
use crate::stack_item::StackItem;
use bitflags::bitflags;
use std::cell::RefCell;
use std::fmt;

bitflags! {
    /// Which event streams a logger receives
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct LogVerbosity: u8 {
        const STEP_INTO = 1 << 0;
        const EXECUTION_CONTEXT_STACK_CHANGES = 1 << 1;
        const EVALUATION_STACK_CHANGES = 1 << 2;
        const ALT_STACK_CHANGES = 1 << 3;
        const RESULT_STACK_CHANGES = 1 << 4;
    }
}

impl Default for LogVerbosity {
    fn default() -> Self {
        LogVerbosity::empty()
    }
}

/// Which stack a `StackChanged` event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StackKind {
    Evaluation,
    Alt,
    Result,
}

impl StackKind {
    pub(crate) fn verbosity(self) -> LogVerbosity {
        match self {
            StackKind::Evaluation => LogVerbosity::EVALUATION_STACK_CHANGES,
            StackKind::Alt => LogVerbosity::ALT_STACK_CHANGES,
            StackKind::Result => LogVerbosity::RESULT_STACK_CHANGES,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LogEvent {
    /// About to execute the instruction described by the snapshot
    StepInto(ContextSnapshot),

    /// A frame was pushed onto or popped off the invocation stack
    ExecutionContextChanged {
        script_hash: ScriptHash,
        index: usize,
        op: StackOp,
    },

    StackChanged {
        stack: StackKind,
        item: StackItem,
        index: usize,
        op: StackOp,
    },
}

impl LogEvent {
    pub fn verbosity(&self) -> LogVerbosity {
        match self {
            LogEvent::StepInto(_) => LogVerbosity::STEP_INTO,
            LogEvent::ExecutionContextChanged { .. } => LogVerbosity::EXECUTION_CONTEXT_STACK_CHANGES,
            LogEvent::StackChanged { stack, .. } => stack.verbosity(),
        }
    }
}

type Subscriber = Box<dyn Fn(&LogEvent)>;

/// Engine observer with subscribable event streams
pub struct Logger {
    verbosity: LogVerbosity,
    subscribers: RefCell<Vec<Subscriber>>,
}

impl Logger {
    pub fn new(verbosity: LogVerbosity) -> Self {
        Logger {
            verbosity,
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// A logger that forwards every enabled event to `tracing` at trace level
    pub fn with_tracing(verbosity: LogVerbosity) -> Self {
        let logger = Logger::new(verbosity);
        logger.subscribe(|event| match event {
            LogEvent::StepInto(snapshot) => tracing::trace!(
                ip = snapshot.instruction_pointer,
                op = ?snapshot.next_instruction,
                eval = snapshot.evaluation_stack_count,
                "step into"
            ),
            LogEvent::ExecutionContextChanged { index, op, .. } => {
                tracing::trace!(index, ?op, "invocation stack changed")
            }
            LogEvent::StackChanged { stack, item, index, op } => {
                tracing::trace!(?stack, index, ?op, ?item, "stack changed")
            }
        });
        logger
    }

    pub fn verbosity(&self) -> LogVerbosity {
        self.verbosity
    }

    #[inline]
    pub fn is_enabled(&self, flag: LogVerbosity) -> bool {
        self.verbosity.contains(flag)
    }

    pub fn subscribe(&self, subscriber: impl Fn(&LogEvent) + 'static) {
        self.subscribers.borrow_mut().push(Box::new(subscriber));
    }

    /// Deliver an event to every subscriber if its stream is enabled
    pub fn emit(&self, event: LogEvent) {
        if !self.is_enabled(event.verbosity()) {
            return;
        }
        for subscriber in self.subscribers.borrow().iter() {
            subscriber(&event);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("verbosity", &self.verbosity)
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}

/// Install a global `tracing` subscriber filtered by `RUST_LOG` or `default_filter`
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_events_filtered_by_verbosity() {
        let logger = Logger::new(LogVerbosity::EVALUATION_STACK_CHANGES);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        logger.subscribe(move |event| sink.borrow_mut().push(event.verbosity()));

        logger.emit(LogEvent::StackChanged {
            stack: StackKind::Evaluation,
            item: StackItem::from(1),
            index: 0,
            op: StackOp::Push,
        });
        logger.emit(LogEvent::StackChanged {
            stack: StackKind::Alt,
            item: StackItem::from(1),
            index: 0,
            op: StackOp::Push,
        });

        assert_eq!(*seen.borrow(), vec![LogVerbosity::EVALUATION_STACK_CHANGES]);
    }

    #[test]
    fn test_verbosity_parses_from_toml() {
        #[derive(serde::Deserialize)]
        struct Holder {
            verbosity: LogVerbosity,
        }
        let holder: Holder = toml::from_str(r#"verbosity = "STEP_INTO | ALT_STACK_CHANGES""#).unwrap();
        assert_eq!(
            holder.verbosity,
            LogVerbosity::STEP_INTO | LogVerbosity::ALT_STACK_CHANGES
        );
    }

    #[test]
    fn test_init_tracing_is_repeatable() {
        init_tracing("warn");
        assert!(!init_tracing("warn"));
    }
}
