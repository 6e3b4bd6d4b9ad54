//! Error types for the VM host
//!
//! Every fallible core operation returns `VmError`. The engine never lets one
//! escape a step: an instruction that returns `Err` moves the VM into
//! `VmState::Fault` and the error is kept as the fault reason.

use thiserror::Error;

/// Errors raised by stack items, stacks, frames, and the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("stack is empty")]
    StackEmpty,

    #[error("stack index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0} has no byte representation")]
    UnsupportedConversion(&'static str),

    #[error("{0} cannot be used as a map key")]
    InvalidMapKey(&'static str),

    /// Use of something that has already been released or disposed
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("unknown interop key {0}")]
    UnknownInteropKey(usize),

    #[error("script {0} not found")]
    ScriptNotFound(String),

    #[error("syscall '{0}' failed")]
    SyscallFailed(String),

    #[error("out of gas: consumed {consumed}, limit {limit}")]
    OutOfGas { consumed: u64, limit: u64 },

    #[error("invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),

    #[error("unexpected end of script at offset {0}")]
    UnexpectedEndOfScript(usize),

    #[error("jump target {0} is outside the script")]
    InvalidJump(i64),

    #[error("{0} limit exceeded")]
    LimitExceeded(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Raised by THROW / THROWIFNOT
    #[error("script raised a fault")]
    Thrown,

    #[error("no execution context")]
    NoContext,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Render bytes as lowercase hex for messages and JSON output
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
