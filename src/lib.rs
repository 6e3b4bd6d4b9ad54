pub mod context;
pub mod engine;
pub mod errors;
pub mod interop;
pub mod interpreter;
pub mod logging;
pub mod script;
pub mod settings;
pub mod stack;
pub mod stack_item;

// Re-export main types
pub use context::{ExecutionContext, RETURN_ALL};
pub use engine::{EngineBuilder, ExecutionEngine, MessageProvider, ScriptTable, VmState};
pub use errors::VmError;
pub use interop::{InteropObject, InteropService};
pub use interpreter::{BasicInterpreter, Interpreter, OpCode};
pub use logging::{LogEvent, LogVerbosity, Logger};
pub use script::{Script, ScriptBuilder, ScriptHash};
pub use settings::EngineSettings;
pub use stack::Stack;
pub use stack_item::{StackItem, StackItemType};
