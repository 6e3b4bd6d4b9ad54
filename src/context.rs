//! Execution context (one call frame)
//!
//! A frame holds:
//! - the script it runs (shared, with a cached content hash)
//! - the instruction pointer
//! - how many values it hands back to its caller on return
//! - its evaluation stack and alt stack
//!
//! Only the interpreter moves the instruction pointer, through the cursor
//! methods below.

use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::script::{Script, ScriptHash};
use crate::stack::Stack;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

/// Return-value count meaning "everything left on the evaluation stack"
pub const RETURN_ALL: i32 = -1;

pub struct ExecutionContext {
    script: Rc<Script>,
    instruction_pointer: usize,
    rvcount: i32,
    evaluation_stack: Stack,
    alt_stack: Stack,
    disposed: bool,
}

/// Point-in-time view of a frame, used by the logger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub script_hash: ScriptHash,
    pub instruction_pointer: usize,
    pub next_instruction: Option<OpCode>,
    pub evaluation_stack_count: usize,
    pub alt_stack_count: usize,
}

impl ExecutionContext {
    pub fn new(script: Rc<Script>, rvcount: i32) -> Self {
        ExecutionContext {
            script,
            instruction_pointer: 0,
            rvcount,
            evaluation_stack: Stack::new(),
            alt_stack: Stack::new(),
            disposed: false,
        }
    }

    pub(crate) fn with_stacks(script: Rc<Script>, rvcount: i32, evaluation_stack: Stack, alt_stack: Stack) -> Self {
        ExecutionContext {
            script,
            instruction_pointer: 0,
            rvcount,
            evaluation_stack,
            alt_stack,
            disposed: false,
        }
    }

    /* ---------- Identity ---------- */

    pub fn script(&self) -> &Rc<Script> {
        &self.script
    }

    /// Hash160 of the script, computed once and cached
    pub fn script_hash(&self) -> ScriptHash {
        self.script.hash()
    }

    pub fn rvcount(&self) -> i32 {
        self.rvcount
    }

    /* ---------- Position ---------- */

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Opcode at the instruction pointer; RET once the script is exhausted
    pub fn next_instruction(&self) -> OpCode {
        self.script
            .bytes()
            .get(self.instruction_pointer)
            .map(|b| OpCode(*b))
            .unwrap_or(OpCode::RET)
    }

    pub fn is_at_end(&self) -> bool {
        self.instruction_pointer >= self.script.len()
    }

    /* ---------- Stacks ---------- */

    pub fn evaluation_stack(&self) -> &Stack {
        &self.evaluation_stack
    }

    pub fn evaluation_stack_mut(&mut self) -> &mut Stack {
        &mut self.evaluation_stack
    }

    pub fn alt_stack(&self) -> &Stack {
        &self.alt_stack
    }

    pub fn alt_stack_mut(&mut self) -> &mut Stack {
        &mut self.alt_stack
    }

    /// Both stacks at once, for moves between them
    pub fn stacks_mut(&mut self) -> (&mut Stack, &mut Stack) {
        (&mut self.evaluation_stack, &mut self.alt_stack)
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            script_hash: self.script_hash(),
            instruction_pointer: self.instruction_pointer,
            next_instruction: (!self.is_at_end()).then(|| self.next_instruction()),
            evaluation_stack_count: self.evaluation_stack.count(),
            alt_stack_count: self.alt_stack.count(),
        }
    }

    /* ---------- Cursor (interpreter-facing) ---------- */

    /// Read the opcode at the instruction pointer and advance past it
    pub fn read_opcode(&mut self) -> OpCode {
        let op = self.next_instruction();
        if !self.is_at_end() {
            self.instruction_pointer += 1;
        }
        op
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&[u8], VmError> {
        let start = self.instruction_pointer;
        let end = start
            .checked_add(count)
            .filter(|end| *end <= self.script.len())
            .ok_or(VmError::UnexpectedEndOfScript(start))?;
        self.instruction_pointer = end;
        Ok(&self.script.bytes()[start..end])
    }

    pub fn read_u8(&mut self) -> Result<u8, VmError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, VmError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, VmError> {
        let bytes = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, VmError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Move to an absolute offset; the end of the script is a valid target
    pub fn jump_to(&mut self, target: i64) -> Result<(), VmError> {
        if target < 0 || target as usize > self.script.len() {
            return Err(VmError::InvalidJump(target));
        }
        self.instruction_pointer = target as usize;
        Ok(())
    }

    /* ---------- Lifetime ---------- */

    /// Release both stacks; later calls are no-ops
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.evaluation_stack.dispose();
        self.alt_stack.dispose();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("script", &self.script)
            .field("instruction_pointer", &self.instruction_pointer)
            .field("rvcount", &self.rvcount)
            .field("evaluation_stack", &self.evaluation_stack)
            .field("alt_stack", &self.alt_stack)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack_item::StackItem;

    fn context(bytes: &[u8]) -> ExecutionContext {
        ExecutionContext::new(Rc::new(Script::new(bytes.to_vec())), RETURN_ALL)
    }

    #[test]
    fn test_reads_advance_instruction_pointer() {
        let mut ctx = context(&[0x62, 0x05, 0x00, 0x01]);

        assert_eq!(ctx.read_opcode(), OpCode::JMP);
        assert_eq!(ctx.read_i16().unwrap(), 5);
        assert_eq!(ctx.instruction_pointer(), 3);
        assert_eq!(ctx.read_u8().unwrap(), 1);
        assert!(ctx.is_at_end());
        assert_eq!(ctx.read_u8().unwrap_err(), VmError::UnexpectedEndOfScript(4));
    }

    #[test]
    fn test_next_instruction_past_end_is_ret() {
        let mut ctx = context(&[0x61]);
        assert_eq!(ctx.next_instruction(), OpCode::NOP);
        ctx.read_opcode();
        assert_eq!(ctx.next_instruction(), OpCode::RET);
        assert_eq!(ctx.snapshot().next_instruction, None);
    }

    #[test]
    fn test_jump_bounds() {
        let mut ctx = context(&[0x61, 0x61]);
        ctx.jump_to(2).unwrap();
        assert_eq!(ctx.instruction_pointer(), 2);
        assert_eq!(ctx.jump_to(3).unwrap_err(), VmError::InvalidJump(3));
        assert_eq!(ctx.jump_to(-1).unwrap_err(), VmError::InvalidJump(-1));
    }

    #[test]
    fn test_script_hash_is_shared_through_script() {
        let script = Rc::new(Script::new(vec![0x51, 0x66]));
        let a = ExecutionContext::new(script.clone(), RETURN_ALL);
        let b = ExecutionContext::new(script.clone(), 1);

        assert_eq!(a.script_hash(), b.script_hash());
        assert!(script.is_hash_computed());
    }

    #[test]
    fn test_dispose_twice_is_safe() {
        let mut ctx = context(&[0x66]);
        ctx.evaluation_stack_mut().push(StackItem::from(1)).unwrap();

        ctx.dispose();
        ctx.dispose();

        assert!(ctx.is_disposed());
        assert_eq!(ctx.evaluation_stack().count(), 0);
        assert!(ctx.evaluation_stack_mut().push(StackItem::from(2)).is_err());
    }
}
