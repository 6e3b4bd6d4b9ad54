//! Tests for syscall dispatch and host objects

use super::helpers::{results, run_on, script};
use crate::context::RETURN_ALL;
use crate::engine::{EngineBuilder, ExecutionEngine, InMemoryScriptTable, VmState};
use crate::errors::VmError;
use crate::interop::service::{GET_CALLING_SCRIPT_HASH, GET_ENTRY_SCRIPT_HASH};
use crate::interop::{InteropObject, InteropService};
use crate::interpreter::OpCode;
use crate::script::{hash160, ScriptBuilder};
use crate::stack_item::StackItem;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/* ===================== Helpers ===================== */

#[derive(Debug)]
struct HostResource {
    id: u32,
    disposed: Arc<AtomicUsize>,
}

impl InteropObject for HostResource {
    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }

    fn type_name(&self) -> &'static str {
        "HostResource"
    }
}

fn push(engine: &mut ExecutionEngine, item: StackItem) -> Result<bool, VmError> {
    engine
        .current_context_mut()
        .ok_or(VmError::NoContext)?
        .evaluation_stack_mut()
        .push(item)?;
    Ok(true)
}

fn syscalls(names: &[&str]) -> Vec<u8> {
    let mut sb = ScriptBuilder::new();
    for name in names {
        sb.emit_syscall(name).unwrap();
    }
    sb.emit(OpCode::RET);
    sb.into_bytes()
}

fn engine_with(service: InteropService) -> ExecutionEngine {
    EngineBuilder::new().interop_service(service).build().unwrap()
}

/* ===================== Dispatch ===================== */

#[test]
fn test_registered_handler_runs() {
    let mut service = InteropService::new();
    service.register("Test.Answer", |engine: &mut ExecutionEngine| push(engine, StackItem::from(42)));
    let mut engine = engine_with(service);

    assert!(run_on(&mut engine, &syscalls(&["Test.Answer"])));
    assert_eq!(results(&engine), vec![StackItem::from(42)]);
}

#[test]
fn test_aliases_share_a_handler() {
    let mut service = InteropService::new();
    service.register_aliases(&["Test.New", "Test.Old"], |engine: &mut ExecutionEngine| {
        push(engine, StackItem::from(1))
    });
    assert!(service.contains("Test.New"));
    assert!(service.contains("Test.Old"));
    assert_eq!(service.len(), 2);

    let mut engine = engine_with(service);
    assert!(run_on(&mut engine, &syscalls(&["Test.New", "Test.Old"])));
    assert_eq!(results(&engine), vec![StackItem::from(1), StackItem::from(1)]);
}

#[test]
fn test_handler_failures_become_false() {
    let mut service = InteropService::new();
    service.register("Test.Err", |_: &mut ExecutionEngine| Err(VmError::Thrown));
    service.register("Test.False", |_: &mut ExecutionEngine| Ok(false));
    service.register("Test.Panic", |_: &mut ExecutionEngine| -> Result<bool, VmError> {
        panic!("handler blew up")
    });
    let mut engine = engine_with(service);
    engine.load_script(&[0x51], RETURN_ALL).unwrap();

    assert!(!engine.invoke_syscall(b"Test.Err"));
    assert!(!engine.invoke_syscall(b"Test.False"));
    assert!(!engine.invoke_syscall(b"Test.Panic"));
    assert!(!engine.invoke_syscall(b"Test.Missing"));
    assert!(!engine.invoke_syscall(&[0xff, 0xfe]));

    // the engine is still usable after a panicking handler
    assert!(engine.execute(10));
}

#[test]
fn test_failing_handler_faults_the_run() {
    let mut service = InteropService::new();
    service.register("Test.Panic", |_: &mut ExecutionEngine| -> Result<bool, VmError> {
        panic!("handler blew up")
    });
    let mut engine = engine_with(service);

    assert!(!run_on(&mut engine, &syscalls(&["Test.Panic"])));
    assert_eq!(engine.state(), VmState::Fault);
    assert_eq!(
        engine.fault_reason(),
        Some(&VmError::SyscallFailed("Test.Panic".to_string()))
    );
}

#[test]
fn test_no_service_fails_every_syscall() {
    let mut engine = ExecutionEngine::new();

    assert!(!engine.invoke_syscall(b"System.ExecutionEngine.GetExecutingScriptHash"));
    assert!(!run_on(&mut engine, &syscalls(&["Test.Anything"])));
}

#[test]
fn test_shared_service_across_engines() {
    let mut service = InteropService::new();
    service.register("Test.Answer", |engine: &mut ExecutionEngine| push(engine, StackItem::from(42)));
    let service = Arc::new(service);

    for _ in 0..3 {
        let mut engine = EngineBuilder::new()
            .shared_interop_service(service.clone())
            .build()
            .unwrap();
        assert!(run_on(&mut engine, &syscalls(&["Test.Answer"])));
    }
    assert_eq!(Arc::strong_count(&service), 1);
}

/* ===================== Standard Handlers ===================== */

#[test]
fn test_calling_and_entry_hashes() {
    let callee = syscalls(&[GET_CALLING_SCRIPT_HASH, GET_ENTRY_SCRIPT_HASH]);
    let mut table = InMemoryScriptTable::new();
    let callee_hash = table.insert(callee);
    let mut engine = EngineBuilder::new()
        .script_table(table)
        .interop_service(InteropService::with_standard_handlers())
        .build()
        .unwrap();

    let main = script(|sb| {
        sb.emit_app_call(&callee_hash, false);
    });
    assert!(run_on(&mut engine, &main));

    let main_hash = StackItem::from(&hash160(&main)[..]);
    assert_eq!(results(&engine), vec![main_hash.clone(), main_hash]);
}

#[test]
fn test_calling_hash_fails_without_caller() {
    let mut engine = engine_with(InteropService::with_standard_handlers());

    assert!(!run_on(&mut engine, &syscalls(&[GET_CALLING_SCRIPT_HASH])));
    assert_eq!(
        engine.fault_reason(),
        Some(&VmError::SyscallFailed(GET_CALLING_SCRIPT_HASH.to_string()))
    );
}

/* ===================== Host Objects ===================== */

#[test]
fn test_interop_identity_is_preserved() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let mut engine = ExecutionEngine::new();
    let resource: Rc<dyn InteropObject> = Rc::new(HostResource {
        id: 1,
        disposed: disposed.clone(),
    });
    let other: Rc<dyn InteropObject> = Rc::new(HostResource {
        id: 2,
        disposed: disposed.clone(),
    });

    let first = engine.create_interop(resource.clone());
    let again = engine.create_interop(resource);
    let different = engine.create_interop(other);

    let (StackItem::Interop(a), StackItem::Interop(b), StackItem::Interop(c)) = (&first, &again, &different) else {
        unreachable!("create_interop returns interop items");
    };
    assert_eq!(a.key(), b.key());
    assert_ne!(a.key(), c.key());
    assert_eq!(first, again);
    assert_ne!(first, different);
    assert_eq!(engine.interop_cache().live_count(), 2);
}

#[test]
fn test_handler_created_objects_disposed_once_on_drop() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = disposed.clone();
    let mut service = InteropService::new();
    service.register("Test.NewResource", move |engine: &mut ExecutionEngine| {
        let item = engine.create_interop(Rc::new(HostResource {
            id: 7,
            disposed: counter.clone(),
        }));
        push(engine, item)
    });
    let mut engine = engine_with(service);

    assert!(run_on(&mut engine, &syscalls(&["Test.NewResource", "Test.NewResource"])));
    let items = results(&engine);
    let StackItem::Interop(handle) = &items[0] else {
        unreachable!("expected an interop item, got {:?}", items[0]);
    };
    assert_eq!(handle.downcast_ref::<HostResource>().map(|p| p.id), Ok(7));
    assert_eq!(engine.interop_cache().live_count(), 2);

    // releasing early means teardown skips the slot
    assert!(engine.interop_cache_mut().release(handle.key()));
    assert!(!engine.interop_cache_mut().release(handle.key()));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    drop(engine);
    assert_eq!(disposed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_clean_keeps_interop_objects_alive() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let mut engine = ExecutionEngine::new();
    engine.create_interop(Rc::new(HostResource {
        id: 3,
        disposed: disposed.clone(),
    }));

    engine.clean(1);
    assert_eq!(disposed.load(Ordering::SeqCst), 0);
    assert_eq!(engine.interop_cache().live_count(), 1);

    drop(engine);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_items_unreadable_after_release() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = disposed.clone();
    let mut service = InteropService::new();
    service.register("Test.NewResource", move |engine: &mut ExecutionEngine| {
        let item = engine.create_interop(Rc::new(HostResource {
            id: 9,
            disposed: counter.clone(),
        }));
        push(engine, item)
    });
    let mut engine = engine_with(service);
    assert!(run_on(&mut engine, &syscalls(&["Test.NewResource"])));

    let items = results(&engine);
    let StackItem::Interop(handle) = &items[0] else {
        unreachable!("expected an interop item, got {:?}", items[0]);
    };
    assert!(handle.object().is_ok());

    drop(engine);

    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert!(handle.is_released());
    assert!(matches!(handle.object(), Err(VmError::InvalidState(_))));
    assert!(matches!(handle.downcast_ref::<HostResource>(), Err(VmError::InvalidState(_))));
    assert_ne!(items[0], items[0].clone());
}

#[test]
fn test_released_key_invalidates_items_still_on_the_stack() {
    let mut engine = ExecutionEngine::new();
    let item = engine.create_interop(Rc::new(HostResource {
        id: 4,
        disposed: Arc::new(AtomicUsize::new(0)),
    }));
    engine.load_script(&[OpCode::RET.0], RETURN_ALL).unwrap();
    push(&mut engine, item).unwrap();

    let StackItem::Interop(handle) = engine.current_context().unwrap().evaluation_stack().peek(0).unwrap() else {
        unreachable!("expected an interop item on the stack");
    };
    assert!(engine.interop_cache_mut().release(handle.key()));

    assert!(engine.execute(10));
    let items = results(&engine);
    let StackItem::Interop(returned) = &items[0] else {
        unreachable!("expected an interop item, got {:?}", items[0]);
    };
    assert!(matches!(returned.object(), Err(VmError::InvalidState(_))));
    assert_eq!(
        engine.result_json()[0]["released"],
        serde_json::json!(true)
    );
}

/* ===================== Cyclic Containers ===================== */

#[derive(Debug)]
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl InteropObject for DropCounter {}

#[test]
fn test_clean_reclaims_cyclic_containers() {
    let dropped = Arc::new(AtomicUsize::new(0));
    let counter = dropped.clone();
    let mut service = InteropService::new();
    service.register("Test.NewCounter", move |engine: &mut ExecutionEngine| {
        let item = engine.create_interop(Rc::new(DropCounter(counter.clone())));
        push(engine, item)
    });
    let mut engine = engine_with(service);

    // a = [a], then a.append(counter), then drop a from the stack
    let mut sb = ScriptBuilder::new();
    sb.emit(OpCode::PUSH0)
        .emit(OpCode::NEWARRAY)
        .emit(OpCode::DUP)
        .emit(OpCode::DUP)
        .emit(OpCode::APPEND)
        .emit(OpCode::DUP);
    sb.emit_syscall("Test.NewCounter").unwrap();
    sb.emit(OpCode::APPEND).emit(OpCode::DROP).emit(OpCode::RET);
    assert!(run_on(&mut engine, &sb.into_bytes()));
    assert!(engine.result_stack().is_empty());

    engine.clean(1);
    // the cache holds the last reference once the cycle is gone
    assert_eq!(dropped.load(Ordering::SeqCst), 0);
    assert!(engine.interop_cache_mut().release(0));
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}
