//! # Opcode interpreter
//!
//! The engine owns frames, stacks and the callback protocols; decoding and
//! executing instructions is delegated to an `Interpreter`.
//!
//! ## Contract
//!
//! 1. `execute_instruction` runs exactly one instruction of the current frame
//! 2. Any `Err` it returns faults the run; the engine records it
//! 3. An empty invocation stack afterwards means the run halted
//!
//! `BasicInterpreter` is the reference implementation used by default.

pub mod basic;
pub mod opcode;

pub use basic::BasicInterpreter;
pub use opcode::OpCode;

use crate::engine::ExecutionEngine;
use crate::errors::VmError;

pub trait Interpreter {
    /// Execute the next instruction of the engine's current frame
    fn execute_instruction(&self, engine: &mut ExecutionEngine) -> Result<(), VmError>;

    /// Gas charged for the next instruction, before it runs
    fn instruction_cost(&self, _engine: &ExecutionEngine) -> u64 {
        1
    }
}
