//! Step records produced by the engine

use super::values::Value;
use serde::{Deserialize, Serialize};

/// The unit produced by executing one statement
///
/// `next_line` is where execution resumes; consumers must not assume
/// `line + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub line: u32,
    pub value: Option<Value>,
    pub next_line: u32,
}

impl StepRecord {
    pub fn new(line: u32, value: Option<Value>, next_line: u32) -> Self {
        Self {
            line,
            value,
            next_line,
        }
    }
}
