//! Tests for the script table and message provider protocols

use super::helpers::{results, run_on, script};
use crate::context::RETURN_ALL;
use crate::engine::{EngineBuilder, ExecutionEngine, InMemoryScriptTable, VmState};
use crate::errors::{to_hex, VmError};
use crate::interop::service::GET_MESSAGE;
use crate::interop::InteropService;
use crate::interpreter::OpCode;
use crate::script::{hash160, ScriptHash};
use crate::stack_item::StackItem;
use maplit::hashmap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/* ===================== Script Table ===================== */

#[test]
fn test_closure_script_table() {
    let callee = vec![OpCode::PUSH5.0, OpCode::RET.0];
    let hash = hash160(&callee);
    let scripts = hashmap! { hash => callee };
    let lookups = Arc::new(Mutex::new(Vec::new()));
    let seen = lookups.clone();

    let mut engine = EngineBuilder::new()
        .script_table(move |hash: &ScriptHash, is_dynamic: bool| {
            seen.lock().unwrap().push(is_dynamic);
            scripts.get(hash).cloned()
        })
        .build()
        .unwrap();

    let main = script(|sb| {
        sb.emit_app_call(&hash, false)
            .emit_push_bytes(&hash)
            .emit_app_call(&[0u8; 20], false);
    });
    assert!(run_on(&mut engine, &main));

    assert_eq!(results(&engine), vec![StackItem::from(5), StackItem::from(5)]);
    assert_eq!(*lookups.lock().unwrap(), vec![false, true]);
}

#[test]
fn test_load_script_by_hash() {
    let mut table = InMemoryScriptTable::new();
    let hash = table.insert(vec![OpCode::PUSH3.0]);
    let mut engine = EngineBuilder::new().script_table(table).build().unwrap();

    engine.load_script_by_hash(&hash, false, RETURN_ALL).unwrap();
    assert_eq!(engine.current_context().unwrap().script_hash(), hash);

    assert!(engine.execute(10));
    assert_eq!(results(&engine), vec![StackItem::from(3)]);
}

#[test]
fn test_unknown_hash_is_script_not_found() {
    let mut engine = EngineBuilder::new()
        .script_table(InMemoryScriptTable::new())
        .build()
        .unwrap();
    let hash = [7u8; 20];

    let result = engine.load_script_by_hash(&hash, false, RETURN_ALL);

    assert_eq!(result, Err(VmError::ScriptNotFound(to_hex(&hash))));
    assert_eq!(engine.invocation_depth(), 0);
}

#[test]
fn test_missing_table_is_script_not_found() {
    let mut engine = ExecutionEngine::new();

    let result = engine.load_script_by_hash(&[1u8; 20], false, RETURN_ALL);

    assert!(matches!(result, Err(VmError::ScriptNotFound(_))));
}

#[test]
fn test_empty_script_from_table_is_not_found() {
    let mut engine = EngineBuilder::new()
        .script_table(|_: &ScriptHash, _: bool| Some(Vec::<u8>::new()))
        .build()
        .unwrap();

    let result = engine.load_script_by_hash(&[1u8; 20], false, RETURN_ALL);

    assert!(matches!(result, Err(VmError::ScriptNotFound(_))));
}

#[test]
fn test_appcall_to_unknown_script_faults() {
    let mut engine = EngineBuilder::new()
        .script_table(InMemoryScriptTable::new())
        .build()
        .unwrap();

    let main = script(|sb| {
        sb.emit_app_call(&[9u8; 20], false);
    });
    assert!(!run_on(&mut engine, &main));

    assert_eq!(engine.state(), VmState::Fault);
    assert_eq!(
        engine.fault_reason(),
        Some(&VmError::ScriptNotFound(to_hex(&[9u8; 20])))
    );
}

#[test]
fn test_resolved_scripts_are_cached() {
    let mut table = InMemoryScriptTable::new();
    let hash = table.insert(vec![OpCode::PUSH1.0]);
    let mut engine = EngineBuilder::new().script_table(table).build().unwrap();

    engine.load_script_by_hash(&hash, false, RETURN_ALL).unwrap();
    engine.load_script_by_hash(&hash, false, RETURN_ALL).unwrap();

    let stack = engine.invocation_stack();
    assert!(std::rc::Rc::ptr_eq(stack[0].script(), stack[1].script()));
    assert!(engine.cached_script(1).is_none());
}

/* ===================== Message Provider ===================== */

fn counting_provider() -> (Arc<AtomicUsize>, impl Fn(u32) -> Option<Vec<u8>> + Send + Sync) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let provider = move |iteration: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(format!("message {}", iteration).into_bytes())
    };
    (calls, provider)
}

#[test]
fn test_message_fetched_once_per_iteration() {
    let (calls, provider) = counting_provider();
    let mut engine = EngineBuilder::new().message_provider(provider).build().unwrap();

    assert_eq!(engine.message(), Some(&b"message 0"[..]));
    assert_eq!(engine.message(), Some(&b"message 0"[..]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    engine.clean(3);
    assert_eq!(engine.message(), Some(&b"message 3"[..]));
    assert_eq!(engine.message(), Some(&b"message 3"[..]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_missing_message_is_cached_too() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut engine = EngineBuilder::new()
        .message_provider(move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            None::<Vec<u8>>
        })
        .build()
        .unwrap();

    assert!(engine.message().is_none());
    assert!(engine.message().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_no_provider_means_no_message() {
    let mut engine = ExecutionEngine::new();
    assert!(engine.message().is_none());
}

#[test]
fn test_get_message_syscall() {
    let (calls, provider) = counting_provider();
    let mut engine = EngineBuilder::new()
        .message_provider(provider)
        .interop_service(InteropService::with_standard_handlers())
        .build()
        .unwrap();
    engine.clean(9);

    let mut sb = crate::script::ScriptBuilder::new();
    sb.emit_syscall(GET_MESSAGE).unwrap();
    sb.emit_syscall(GET_MESSAGE).unwrap();
    sb.emit(OpCode::RET);
    assert!(run_on(&mut engine, &sb.into_bytes()));

    assert_eq!(
        results(&engine),
        vec![StackItem::from("message 9"), StackItem::from("message 9")]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_get_message_without_provider_faults() {
    let mut engine = EngineBuilder::new()
        .interop_service(InteropService::with_standard_handlers())
        .build()
        .unwrap();

    let mut sb = crate::script::ScriptBuilder::new();
    sb.emit_syscall(GET_MESSAGE).unwrap();
    assert!(!run_on(&mut engine, &sb.into_bytes()));

    assert_eq!(
        engine.fault_reason(),
        Some(&VmError::SyscallFailed(GET_MESSAGE.to_string()))
    );
}
