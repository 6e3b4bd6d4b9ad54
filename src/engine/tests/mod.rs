//! Tests for the execution engine
//!
//! Organized by feature area

mod concurrency_tests;
mod helpers;
mod interop_tests;
mod protocol_tests;
mod state_tests;
