//! # Executor - Resumable Line-Stepping Interpreter
//!
//! Runs a linked `Program` one statement at a time.
//!
//! ## Core Principles
//!
//! 1. **Stack-driven execution**: all state lives in explicit frame stacks, no
//!    recursion over the tree and no coroutines
//! 2. **Statement-level stepping**: `Engine::step` yields one `StepRecord` per
//!    executed statement, with the line execution resumes at
//! 3. **Addressable positions**: frames point into the program by path, so
//!    labels resolve in O(1) and jumps rebuild the stack directly
//! 4. **Pure executor**: no I/O and no sleeping; delays, suspension and
//!    service transport belong to the host

pub mod assign;
pub mod errors;
pub mod exec_loop;
pub mod expressions;
pub mod program;
pub mod scope;
pub mod statements;
pub mod stdlib;
pub mod types;
pub mod vm;
pub mod web;

#[cfg(test)]
mod tests;

use std::sync::Arc;

// Re-export commonly used items
pub use errors::{ErrorInfo, ExecutionException, LinkWarning, RuntimeError, RuntimeWarning};
pub use program::{Program, Unit};
pub use scope::{Scope, WebSignature, EXCEPTION_MESSAGE_KEY};
pub use types::{Block, Expr, StepRecord, Stmt, Value};
pub use vm::{Engine, EngineOptions};

/// Start a run of `program` over `scope` with default options
pub fn execute(program: Arc<Program>, scope: Scope) -> Engine {
    Engine::new(program, scope, EngineOptions::default())
}
