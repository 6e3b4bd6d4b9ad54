//! Engine construction
//!
//! Every collaborator is optional; leaving one out disables its protocol:
//! - no script table: APPCALL-style loads fail
//! - no interop service: every syscall fails
//! - no message provider: there is never a message
//! - no logger: no events are built at all
//!
//! Settings are validated up front, so a bad configuration is reported by
//! `build` rather than on the first instruction.
//!
//! # Example
//!
//! ```rust
//! use neovm_host::engine::{EngineBuilder, VmState};
//! use neovm_host::interop::InteropService;
//!
//! let mut engine = EngineBuilder::new()
//!     .interop_service(InteropService::with_standard_handlers())
//!     .build()
//!     .unwrap();
//!
//! engine.load_script(&[0x51, 0x66], -1);
//! assert!(engine.execute(100));
//! assert_eq!(engine.state(), VmState::Halt);
//! ```

use super::protocols::{MessageProvider, ScriptTable};
use super::ExecutionEngine;
use crate::errors::VmError;
use crate::interop::InteropService;
use crate::interpreter::{BasicInterpreter, Interpreter};
use crate::logging::Logger;
use crate::settings::EngineSettings;
use std::rc::Rc;
use std::sync::Arc;

/// Everything an engine is constructed from
#[derive(Clone)]
pub struct EngineOptions {
    pub settings: EngineSettings,
    pub script_table: Option<Arc<dyn ScriptTable>>,
    pub interop_service: Option<Arc<InteropService>>,
    pub message_provider: Option<Arc<dyn MessageProvider>>,
    pub logger: Option<Rc<Logger>>,
    pub interpreter: Arc<dyn Interpreter + Send + Sync>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settings: EngineSettings::default(),
            script_table: None,
            interop_service: None,
            message_provider: None,
            logger: None,
            interpreter: Arc::new(BasicInterpreter),
        }
    }
}

impl EngineOptions {
    pub(crate) fn into_engine(self) -> ExecutionEngine {
        ExecutionEngine::from_options(self)
    }
}

/// Builder for constructing an `ExecutionEngine`
pub struct EngineBuilder {
    options: EngineOptions,
    tracing_logger: bool,
}

impl EngineBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self {
            options: EngineOptions::default(),
            tracing_logger: false,
        }
    }

    /// Set the engine settings
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.options.settings = settings;
        self
    }

    /// Set the script table
    pub fn script_table(mut self, table: impl ScriptTable + 'static) -> Self {
        self.options.script_table = Some(Arc::new(table));
        self
    }

    /// Set a script table that is shared with other engines
    pub fn shared_script_table(mut self, table: Arc<dyn ScriptTable>) -> Self {
        self.options.script_table = Some(table);
        self
    }

    /// Set the interop service
    pub fn interop_service(mut self, service: InteropService) -> Self {
        self.options.interop_service = Some(Arc::new(service));
        self
    }

    /// Set an interop service that is shared with other engines
    pub fn shared_interop_service(mut self, service: Arc<InteropService>) -> Self {
        self.options.interop_service = Some(service);
        self
    }

    /// Set the message provider
    pub fn message_provider(mut self, provider: impl MessageProvider + 'static) -> Self {
        self.options.message_provider = Some(Arc::new(provider));
        self
    }

    /// Set the logger
    pub fn logger(mut self, logger: Rc<Logger>) -> Self {
        self.options.logger = Some(logger);
        self.tracing_logger = false;
        self
    }

    /// Log to `tracing` with the verbosity from the final settings
    ///
    /// The logger is created in `build`, so settings given afterwards still apply.
    pub fn tracing_logger(mut self) -> Self {
        self.tracing_logger = true;
        self
    }

    /// Replace the reference interpreter
    pub fn interpreter(mut self, interpreter: impl Interpreter + Send + Sync + 'static) -> Self {
        self.options.interpreter = Arc::new(interpreter);
        self
    }

    /// Validate the settings and construct the engine
    pub fn build(mut self) -> Result<ExecutionEngine, VmError> {
        self.options.settings.validate()?;
        if self.tracing_logger {
            let verbosity = self.options.settings.log_verbosity;
            self.options.logger = Some(Rc::new(Logger::with_tracing(verbosity)));
        }
        Ok(self.options.into_engine())
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
