//! Error taxonomy for the executor
//!
//! Runtime faults are `RuntimeError`s. When a fault escapes the statement that
//! raised it, the engine wraps it into an `ExecutionException` carrying that
//! statement's line. User-level errors (`Error`/`Throw` statements) travel as
//! ordinary `Value` data inside `RuntimeError::Thrown`.

use super::types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/* ===================== Error Codes ===================== */

pub const UNDEFINED_VARIABLE: &str = "UndefinedVariable";
pub const ASSIGN_TO_CONSTANT: &str = "AssignToConstant";
pub const UNDEFINED_LABEL: &str = "UndefinedLabel";
pub const MISSING_OUTPUT_PARAMETER: &str = "MissingOutputParameter";
pub const UNDEFINED_FUNCTION: &str = "UndefinedFunction";
pub const WRONG_ARG_COUNT: &str = "WrongArgCount";
pub const TYPE_ERROR: &str = "TypeError";
pub const DIVISION_BY_ZERO: &str = "DivisionByZero";
pub const INDEX_OUT_OF_RANGE: &str = "IndexOutOfRange";
pub const PROPERTY_NOT_FOUND: &str = "PropertyNotFound";
pub const ASSIGNMENT_MISMATCH: &str = "AssignmentMismatch";
pub const CALL_DEPTH_EXCEEDED: &str = "CallDepthExceeded";
pub const SERVICE_ERROR: &str = "ServiceError";
pub const CANCELLED: &str = "Cancelled";
pub const USER_ERROR: &str = "USER_ERROR";

/* ===================== Error Payload ===================== */

/// Error payload carried by `Value::Error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/* ===================== Runtime Faults ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Cannot assign to constant '{0}'")]
    AssignToConstant(String),

    #[error("Undefined label '{0}'")]
    UndefinedLabel(String),

    #[error("Output parameter '{param}' missing in response of '{service}'")]
    MissingOutputParameter { service: String, param: String },

    #[error("Undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("{function} expects {expected} argument(s), got {got}")]
    WrongArgCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("{0}")]
    TypeError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Property '{0}' not found")]
    PropertyNotFound(String),

    #[error("Cannot assign {values} value(s) to {targets} target(s)")]
    AssignmentMismatch { targets: usize, values: usize },

    #[error("Call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("Service '{service}' failed: {message}")]
    Service { service: String, message: String },

    #[error("{}", thrown_message(.0))]
    Thrown(Value),

    #[error("Execution cancelled")]
    Cancelled,
}

impl RuntimeError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        RuntimeError::TypeError(msg.into())
    }

    /// Stable code used in `ErrorInfo` payloads
    pub fn code(&self) -> &str {
        match self {
            RuntimeError::UndefinedVariable(_) => UNDEFINED_VARIABLE,
            RuntimeError::AssignToConstant(_) => ASSIGN_TO_CONSTANT,
            RuntimeError::UndefinedLabel(_) => UNDEFINED_LABEL,
            RuntimeError::MissingOutputParameter { .. } => MISSING_OUTPUT_PARAMETER,
            RuntimeError::UndefinedFunction(_) => UNDEFINED_FUNCTION,
            RuntimeError::WrongArgCount { .. } => WRONG_ARG_COUNT,
            RuntimeError::TypeError(_) => TYPE_ERROR,
            RuntimeError::DivisionByZero => DIVISION_BY_ZERO,
            RuntimeError::IndexOutOfRange { .. } => INDEX_OUT_OF_RANGE,
            RuntimeError::PropertyNotFound(_) => PROPERTY_NOT_FOUND,
            RuntimeError::AssignmentMismatch { .. } => ASSIGNMENT_MISMATCH,
            RuntimeError::CallDepthExceeded(_) => CALL_DEPTH_EXCEEDED,
            RuntimeError::Service { .. } => SERVICE_ERROR,
            RuntimeError::Thrown(Value::Error(info)) => &info.code,
            RuntimeError::Thrown(_) => USER_ERROR,
            RuntimeError::Cancelled => CANCELLED,
        }
    }

    /// Terminal faults bypass every handler
    pub fn is_terminal(&self) -> bool {
        matches!(self, RuntimeError::Cancelled)
    }

    /// The value a `catch` block sees for this fault
    pub fn payload(&self) -> Value {
        match self {
            RuntimeError::Thrown(v) => v.clone(),
            other => Value::Error(ErrorInfo::new(other.code(), other.to_string())),
        }
    }
}

fn thrown_message(v: &Value) -> String {
    match v {
        Value::Error(info) => info.message.clone(),
        other => other.to_string(),
    }
}

/* ===================== Wrapped Exception ===================== */

/// Uniform fault raised out of the engine, tagged with the originating line
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Error on line {line}: {cause}")]
pub struct ExecutionException {
    pub line: u32,
    #[source]
    pub cause: RuntimeError,
}

impl ExecutionException {
    pub fn new(line: u32, cause: RuntimeError) -> Self {
        Self { line, cause }
    }
}

/* ===================== Warnings ===================== */

/// Diagnostics produced while linking a program; none of them stop linking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum LinkWarning {
    UnrecognizedEscape { line: u32, sequence: String },
    DuplicateLabel { line: u32, name: String },
    UndefinedLabel { line: u32, name: String },
}

impl std::fmt::Display for LinkWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkWarning::UnrecognizedEscape { line, sequence } => {
                write!(f, "line {}: unrecognized escape sequence '{}'", line, sequence)
            }
            LinkWarning::DuplicateLabel { line, name } => {
                write!(f, "line {}: label '{}' already declared", line, name)
            }
            LinkWarning::UndefinedLabel { line, name } => {
                write!(f, "line {}: label '{}' not declared", line, name)
            }
        }
    }
}

/// Non-fatal events recorded while running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum RuntimeWarning {
    MissingOutputParameter {
        line: u32,
        service: String,
        param: String,
    },
}

/// Failure to load a program
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("Invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),
}
