//! Shared helpers for engine tests

use crate::context::RETURN_ALL;
use crate::engine::ExecutionEngine;
use crate::interpreter::OpCode;
use crate::script::ScriptBuilder;
use crate::stack_item::StackItem;

/// Assemble a script and terminate it with RET
pub fn script(build: impl FnOnce(&mut ScriptBuilder)) -> Vec<u8> {
    let mut sb = ScriptBuilder::new();
    build(&mut sb);
    sb.emit(OpCode::RET);
    sb.into_bytes()
}

/// Load `bytes` into `engine` and run it with a generous budget
pub fn run_on(engine: &mut ExecutionEngine, bytes: &[u8]) -> bool {
    engine.load_script(bytes, RETURN_ALL).expect("script should load");
    engine.execute(10_000)
}

/// Result stack, bottom first
pub fn results(engine: &ExecutionEngine) -> Vec<StackItem> {
    engine.result_stack().iter().cloned().collect()
}

/// Evaluation stack of the current frame, bottom first
pub fn evaluation(engine: &ExecutionEngine) -> Vec<StackItem> {
    engine
        .current_context()
        .map(|context| context.evaluation_stack().iter().cloned().collect())
        .unwrap_or_default()
}
