//! Tests for the engine state machine, gas and script loading

use super::helpers::{results, run_on, script};
use crate::context::RETURN_ALL;
use crate::engine::{EngineBuilder, ExecutionEngine, VmState};
use crate::errors::VmError;
use crate::interpreter::OpCode;
use crate::settings::{EngineSettings, Limits};
use crate::stack_item::StackItem;
use serde_json::json;

/* ===================== Halt & Results ===================== */

#[test]
fn test_push1_ret_halts_with_one_result() {
    let mut engine = ExecutionEngine::new();

    assert_eq!(engine.load_script(&[0x51, 0x66], RETURN_ALL), Some(0));
    assert!(engine.execute(100));

    assert_eq!(engine.state(), VmState::Halt);
    assert_eq!(engine.result_stack().count(), 1);
    assert_eq!(results(&engine), vec![StackItem::from(1)]);
    assert_eq!(engine.invocation_depth(), 0);
    assert_eq!(engine.gas_consumed(), 2);
    assert!(engine.fault_reason().is_none());
}

#[test]
fn test_running_off_the_end_returns() {
    let mut engine = ExecutionEngine::new();
    engine.load_script(&[0x52], RETURN_ALL).unwrap();

    assert!(engine.execute(100));
    assert_eq!(results(&engine), vec![StackItem::from(2)]);
}

#[test]
fn test_execute_without_frames_halts() {
    let mut engine = ExecutionEngine::new();

    assert!(engine.execute(10));
    assert!(engine.result_stack().is_empty());
}

#[test]
fn test_result_json() {
    let mut engine = ExecutionEngine::new();
    run_on(
        &mut engine,
        &script(|sb| {
            sb.emit_push_int(7)
                .emit_push_bytes(&[0xab, 0xcd])
                .emit(OpCode::PUSH0)
                .emit(OpCode::NOT);
        }),
    );

    assert_eq!(
        engine.result_json(),
        json!([
            {"type": "Integer", "value": "7"},
            {"type": "ByteString", "value": "abcd"},
            {"type": "Boolean", "value": true},
        ])
    );
}

/* ===================== Faults ===================== */

#[test]
fn test_fault_is_terminal() {
    let mut engine = ExecutionEngine::new();
    engine.load_script(&[OpCode::THROW.0], RETURN_ALL).unwrap();

    assert!(!engine.execute(100));
    assert_eq!(engine.state(), VmState::Fault);
    assert_eq!(engine.fault_reason(), Some(&VmError::Thrown));

    // frames stay for inspection and nothing runs again
    assert_eq!(engine.invocation_depth(), 1);
    assert!(!engine.execute(100));
    assert_eq!(engine.step_into(), VmState::Fault);
    assert_eq!(engine.gas_consumed(), 1);
}

#[test]
fn test_invalid_settings_rejected_by_builder() {
    let settings = EngineSettings {
        limits: Limits {
            max_stack_size: 0,
            ..Limits::default()
        },
        ..EngineSettings::default()
    };

    let result = EngineBuilder::new().settings(settings).build();

    assert!(matches!(result, Err(VmError::InvalidConfiguration(_))));
}

/* ===================== Gas ===================== */

#[test]
fn test_out_of_gas_faults() {
    let mut engine = ExecutionEngine::new();
    engine.load_script(&[OpCode::JMP.0, 0x00, 0x00], RETURN_ALL).unwrap();

    assert!(!engine.execute(10));

    assert_eq!(engine.state(), VmState::Fault);
    assert_eq!(
        engine.fault_reason(),
        Some(&VmError::OutOfGas {
            consumed: 10,
            limit: 10
        })
    );
    assert_eq!(engine.gas_consumed(), 10);
}

#[test]
fn test_default_gas_bounds_stepping() {
    let mut engine = EngineBuilder::new()
        .settings(EngineSettings {
            default_gas: Some(2),
            ..EngineSettings::default()
        })
        .build()
        .unwrap();
    let bytes = script(|sb| {
        sb.emit_push_int(1).emit_push_int(2).emit(OpCode::ADD);
    });
    engine.load_script(&bytes, RETURN_ALL).unwrap();

    assert_eq!(engine.step_into_n(2), VmState::Break);
    assert_eq!(engine.step_into(), VmState::Fault);
    assert!(matches!(engine.fault_reason(), Some(VmError::OutOfGas { .. })));
}

#[test]
fn test_increase_gas_extends_the_run() {
    let mut engine = EngineBuilder::new()
        .settings(EngineSettings {
            default_gas: Some(2),
            ..EngineSettings::default()
        })
        .build()
        .unwrap();
    let bytes = script(|sb| {
        sb.emit_push_int(1).emit_push_int(2).emit(OpCode::ADD);
    });
    engine.load_script(&bytes, RETURN_ALL).unwrap();

    assert_eq!(engine.step_into_n(2), VmState::Break);
    engine.increase_gas(10);
    assert_eq!(engine.gas_limit(), 12);

    assert_eq!(engine.step_into_n(10), VmState::Halt);
    assert_eq!(results(&engine), vec![StackItem::from(3)]);
}

#[test]
fn test_execute_budget_is_relative_to_consumed() {
    let mut engine = ExecutionEngine::new();
    engine.add_breakpoint(crate::script::hash160(&[0x51, 0x52, 0x53, 0x66]), 2);
    engine.load_script(&[0x51, 0x52, 0x53, 0x66], RETURN_ALL).unwrap();

    assert!(!engine.execute(100));
    assert_eq!(engine.state(), VmState::Break);
    assert_eq!(engine.gas_consumed(), 2);

    // only two more instructions are affordable
    assert!(engine.execute(2));
    assert_eq!(engine.gas_limit(), 4);
}

/* ===================== Script Loading ===================== */

#[test]
fn test_empty_script_is_not_loaded() {
    let mut engine = ExecutionEngine::new();

    assert_eq!(engine.load_script(&[], RETURN_ALL), None);
    assert_eq!(engine.invocation_depth(), 0);
    assert!(engine.cached_script(0).is_none());
}

#[test]
fn test_identical_scripts_share_a_cache_entry() {
    let mut engine = ExecutionEngine::new();

    let first = engine.load_script(&[0x51], RETURN_ALL);
    let second = engine.load_script(&[0x52], RETURN_ALL);
    let again = engine.load_script(&[0x51], RETURN_ALL);

    assert_eq!(first, Some(0));
    assert_eq!(second, Some(1));
    assert_eq!(again, Some(0));
    assert_eq!(engine.invocation_depth(), 3);

    let stack = engine.invocation_stack();
    assert!(std::rc::Rc::ptr_eq(stack[0].script(), stack[2].script()));
}

#[test]
fn test_load_cached_script_unknown_index() {
    let mut engine = ExecutionEngine::new();
    engine.load_script(&[0x51], RETURN_ALL).unwrap();

    assert!(!engine.load_cached_script(5, RETURN_ALL));
    assert_eq!(engine.invocation_depth(), 1);
}

#[test]
fn test_load_respects_invocation_limit() {
    let mut engine = EngineBuilder::new()
        .settings(EngineSettings {
            limits: Limits {
                max_invocation_stack_size: 1,
                ..Limits::default()
            },
            ..EngineSettings::default()
        })
        .build()
        .unwrap();

    assert_eq!(engine.load_script(&[0x51], RETURN_ALL), Some(0));
    assert_eq!(engine.load_script(&[0x51], RETURN_ALL), None);
    assert_eq!(engine.invocation_depth(), 1);
}

#[test]
fn test_entry_and_calling_contexts() {
    let mut engine = ExecutionEngine::new();
    engine.load_script(&[0x51], RETURN_ALL).unwrap();
    assert!(engine.calling_context().is_none());

    engine.load_script(&[0x52], RETURN_ALL).unwrap();
    let entry = engine.entry_context().unwrap().script_hash();
    let caller = engine.calling_context().unwrap().script_hash();
    let current = engine.current_context().unwrap().script_hash();

    assert_eq!(entry, crate::script::hash160(&[0x51]));
    assert_eq!(caller, entry);
    assert_eq!(current, crate::script::hash160(&[0x52]));
}

/* ===================== Clean ===================== */

#[test]
fn test_clean_resets_for_reuse() {
    let mut engine = ExecutionEngine::new();
    let index = engine.load_script(&[OpCode::THROW.0], RETURN_ALL).unwrap();
    assert!(!engine.execute(100));

    engine.clean(7);

    assert_eq!(engine.state(), VmState::None);
    assert!(engine.fault_reason().is_none());
    assert_eq!(engine.gas_consumed(), 0);
    assert_eq!(engine.iteration(), 7);
    assert_eq!(engine.invocation_depth(), 0);
    assert!(engine.result_stack().is_empty());

    // the script cache survives a clean
    assert!(engine.cached_script(index).is_some());
    assert!(run_on(&mut engine, &[0x53, 0x66]));
    assert_eq!(results(&engine), vec![StackItem::from(3)]);
}

#[test]
fn test_clean_then_load_cached_script() {
    let mut engine = ExecutionEngine::new();
    let index = engine.load_script(&[0x54, 0x66], RETURN_ALL).unwrap();
    assert!(engine.execute(10));

    engine.clean(1);
    assert!(engine.load_cached_script(index, RETURN_ALL));
    assert!(engine.execute(10));

    assert_eq!(results(&engine), vec![StackItem::from(4)]);
}
