//! Execution phase enums for each structured statement
//!
//! Each structured statement has its own Phase enum that tracks which
//! execution step it's currently at. These are serialized as u8.

use serde::{Deserialize, Serialize};

/// Execution phase for Condition statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum IfPhase {
    /// Evaluate branch tests in order
    Test = 0,
    /// A branch block is running; pop when it finishes
    Branch = 1,
}

/// Execution phase for Cycle and DoCycle statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoopPhase {
    /// Evaluate the loop test
    Test = 0,
    /// The body is running
    Body = 1,
}

/// Execution phase for Retry statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RetryPhase {
    /// Evaluate the attempt budget (once)
    Enter = 0,
    /// The body is running
    Body = 1,
    /// Body finished; evaluate the repeat test
    Test = 2,
}

/// Execution phase for TryCatch statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TryPhase {
    /// Executing the protected block
    Body = 0,
    /// Executing the catch block (error was caught)
    Catch = 1,
}
