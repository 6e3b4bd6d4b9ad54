//! Bytecode assembly
//!
//! Encoding rules:
//! - pushes of up to 75 bytes use the length itself as the opcode
//! - longer pushes use PUSHDATA1/2/4 followed by a 1/2/4-byte little-endian length
//! - SYSCALL is followed by a 1-byte name length and the ASCII name
//! - jumps and calls take a little-endian i16 offset from the instruction start

use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::stack_item::integer;
use num_bigint::BigInt;

#[derive(Debug, Default, Clone)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        ScriptBuilder::default()
    }

    /// Current offset, i.e. where the next instruction starts
    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn emit(&mut self, op: OpCode) -> &mut Self {
        self.bytes.push(op.0);
        self
    }

    pub fn emit_with(&mut self, op: OpCode, operand: &[u8]) -> &mut Self {
        self.bytes.push(op.0);
        self.bytes.extend_from_slice(operand);
        self
    }

    pub fn emit_push_int(&mut self, value: impl Into<BigInt>) -> &mut Self {
        let value = value.into();
        if value == BigInt::from(-1) {
            return self.emit(OpCode::PUSHM1);
        }
        if value == BigInt::from(0) {
            return self.emit(OpCode::PUSH0);
        }
        if let Some(op) = u8::try_from(&value).ok().and_then(OpCode::push_small_int) {
            return self.emit(op);
        }
        self.emit_push_bytes(&integer::encode(&value))
    }

    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        if value {
            self.emit(OpCode::PUSH1)
        } else {
            self.emit(OpCode::PUSH0)
        }
    }

    pub fn emit_push_bytes(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len();
        if len <= OpCode::PUSHBYTES75.0 as usize {
            self.bytes.push(len as u8);
        } else if len <= u8::MAX as usize {
            self.bytes.push(OpCode::PUSHDATA1.0);
            self.bytes.push(len as u8);
        } else if len <= u16::MAX as usize {
            self.bytes.push(OpCode::PUSHDATA2.0);
            self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.bytes.push(OpCode::PUSHDATA4.0);
            self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn emit_push_str(&mut self, data: &str) -> &mut Self {
        self.emit_push_bytes(data.as_bytes())
    }

    /// Emit a jump-family instruction with an offset relative to its start
    pub fn emit_jump(&mut self, op: OpCode, offset: i16) -> &mut Self {
        self.emit_with(op, &offset.to_le_bytes())
    }

    /// CALL_I: return count, parameter count, relative offset
    pub fn emit_call_i(&mut self, rvcount: u8, pcount: u8, offset: i16) -> &mut Self {
        self.bytes.push(OpCode::CALL_I.0);
        self.bytes.push(rvcount);
        self.bytes.push(pcount);
        self.bytes.extend_from_slice(&offset.to_le_bytes());
        self
    }

    /// APPCALL or TAILCALL to a script hash; all zeros means "pop the hash"
    pub fn emit_app_call(&mut self, hash: &[u8; 20], tail_call: bool) -> &mut Self {
        let op = if tail_call { OpCode::TAILCALL } else { OpCode::APPCALL };
        self.emit_with(op, hash)
    }

    pub fn emit_syscall(&mut self, name: &str) -> Result<&mut Self, VmError> {
        if !name.is_ascii() || name.is_empty() || name.len() > u8::MAX as usize {
            return Err(VmError::InvalidArgument(format!(
                "syscall name '{}' must be 1..=255 ASCII bytes",
                name
            )));
        }
        self.bytes.push(OpCode::SYSCALL.0);
        self.bytes.push(name.len() as u8);
        self.bytes.extend_from_slice(name.as_bytes());
        Ok(self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
