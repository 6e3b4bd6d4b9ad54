//! Tests for engines running on many threads
//!
//! Engines are `!Send`, so each thread builds its own; only the
//! collaborators behind `Arc` are shared.

use super::helpers::{results, script};
use crate::context::RETURN_ALL;
use crate::engine::{EngineBuilder, InMemoryScriptTable, ScriptTable};
use crate::interop::InteropService;
use crate::interpreter::OpCode;
use crate::stack_item::StackItem;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 4;
const RUNS: usize = 1000;

#[test]
fn test_threads_share_a_read_only_script_table() {
    let mut table = InMemoryScriptTable::new();
    let adder = table.insert(vec![OpCode::ADD.0, OpCode::RET.0]);
    let table: Arc<dyn ScriptTable> = Arc::new(table);
    let service = Arc::new(InteropService::with_standard_handlers());

    let halted: Vec<usize> = thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|worker| {
                let table = table.clone();
                let service = service.clone();
                scope.spawn(move || {
                    let mut halted = 0;
                    for run in 0..RUNS {
                        let mut engine = EngineBuilder::new()
                            .shared_script_table(table.clone())
                            .shared_interop_service(service.clone())
                            .build()
                            .unwrap();
                        let main = script(|sb| {
                            sb.emit_push_int(worker as i64)
                                .emit_push_int(run as i64)
                                .emit_app_call(&adder, false);
                        });
                        engine.load_script(&main, RETURN_ALL).unwrap();

                        let expected = vec![StackItem::from((worker + run) as i64)];
                        if engine.execute(100) && results(&engine) == expected {
                            halted += 1;
                        }
                    }
                    halted
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(halted, vec![RUNS; THREADS]);
    assert_eq!(Arc::strong_count(&table), 1);
}

#[test]
fn test_threads_reuse_their_engine_with_clean() {
    let mut table = InMemoryScriptTable::new();
    let adder = table.insert(vec![OpCode::ADD.0, OpCode::RET.0]);
    let table: Arc<dyn ScriptTable> = Arc::new(table);

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let table = table.clone();
            scope.spawn(move || {
                let mut engine = EngineBuilder::new().shared_script_table(table).build().unwrap();
                let main = script(|sb| {
                    sb.emit_push_int(worker as i64)
                        .emit_push_int(1)
                        .emit_app_call(&adder, false);
                });
                for run in 0..RUNS {
                    engine.clean(run as u32);
                    assert_eq!(engine.load_script(&main, RETURN_ALL), Some(0));
                    assert!(engine.execute(100));
                    assert_eq!(results(&engine), vec![StackItem::from(worker as i64 + 1)]);
                }
            });
        }
    });
}
