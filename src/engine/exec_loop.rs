//! Core execution loop
//!
//! `execute_next` is the single place an instruction runs. Every public
//! driver is a loop around it:
//! 1. execute() - run until Halt, Fault, a breakpoint, or the gas budget runs out
//! 2. step_into() / step_into_n() - run a fixed number of instructions
//! 3. step_over() - run until the invocation stack is no deeper than before
//! 4. step_out() - run until the current frame has returned
//!
//! The stepping drivers leave a non-terminal engine in `Break`.

use super::{ExecutionEngine, VmState};
use crate::errors::VmError;
use crate::logging::{LogEvent, LogVerbosity};

/* ===================== Public API ===================== */

impl ExecutionEngine {
    /// Run with `gas_budget` more gas available
    ///
    /// Returns true iff the run halted. Running out of gas faults the run;
    /// hitting a breakpoint leaves it in `Break`, and the next call resumes.
    pub fn execute(&mut self, gas_budget: u64) -> bool {
        self.set_gas_budget(gas_budget);
        self.resume();
        while self.state() == VmState::None {
            self.execute_next();
        }
        self.state() == VmState::Halt
    }

    /// Execute one instruction
    pub fn step_into(&mut self) -> VmState {
        self.step_into_n(1)
    }

    /// Execute up to `n` instructions, stopping early if the run ends or
    /// reaches a breakpoint
    pub fn step_into_n(&mut self, n: usize) -> VmState {
        if !self.resume() {
            return self.state();
        }
        for _ in 0..n {
            self.execute_next();
            if self.state() != VmState::None {
                break;
            }
        }
        self.pause()
    }

    /// Execute one instruction, running any call it makes to completion
    pub fn step_over(&mut self) -> VmState {
        if !self.resume() {
            return self.state();
        }
        let depth = self.invocation_depth();
        loop {
            self.execute_next();
            if self.state() != VmState::None || self.invocation_depth() <= depth {
                break;
            }
        }
        self.pause()
    }

    /// Run until the current frame returns to its caller
    pub fn step_out(&mut self) -> VmState {
        if !self.resume() {
            return self.state();
        }
        let depth = self.invocation_depth();
        while self.state() == VmState::None && self.invocation_depth() >= depth {
            self.execute_next();
        }
        self.pause()
    }
}

/* ===================== Loop Internals ===================== */

impl ExecutionEngine {
    /// Clear `Break` so execution can continue; false if the run is over
    fn resume(&mut self) -> bool {
        match self.state() {
            VmState::Halt | VmState::Fault => false,
            _ => {
                self.set_state(VmState::None);
                true
            }
        }
    }

    fn pause(&mut self) -> VmState {
        if self.state() == VmState::None {
            self.set_state(VmState::Break);
        }
        self.state()
    }

    /// Execute the current frame's next instruction
    ///
    /// An empty invocation stack halts. Gas is charged before the
    /// instruction runs; an instruction error faults the run.
    fn execute_next(&mut self) {
        let Some(context) = self.current_context() else {
            self.set_state(VmState::Halt);
            return;
        };

        tracing::trace!(
            ip = context.instruction_pointer(),
            op = %context.next_instruction(),
            depth = self.invocation_depth(),
            "step"
        );
        if self.logs(LogVerbosity::STEP_INTO) {
            self.emit(LogEvent::StepInto(context.snapshot()));
        }

        let interpreter = self.interpreter.clone();
        let cost = interpreter.instruction_cost(self);
        if !self.charge_gas(cost) {
            let error = VmError::OutOfGas {
                consumed: self.gas_consumed(),
                limit: self.gas_limit(),
            };
            self.fault(error);
            return;
        }

        match interpreter.execute_instruction(self) {
            Err(error) => self.fault(error),
            Ok(()) if self.invocation_stack.is_empty() => self.set_state(VmState::Halt),
            Ok(()) if self.at_breakpoint() => self.set_state(VmState::Break),
            Ok(()) => {}
        }
    }
}
