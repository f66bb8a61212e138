//! Type definitions for the executor
//!
//! This module contains all the core types used by the executor:
//! - AST nodes (Stmt, Expr, Block)
//! - Runtime values (Value)
//! - Step records
//! - Control flow (Control, Frame, FrameKind, positions)
//! - Phase enums for structured statements

pub mod ast;
pub mod control;
pub mod phase;
pub mod step;
pub mod values;

// Re-export all types for convenient access
pub use ast::{
    AssignOp, Attr, BinaryOp, Block, BlockSel, Branch, ConstBinding, Expr, ProcedureCall, Stmt,
    UnaryOp,
};
pub use control::{BlockPath, Control, Frame, FrameKind, StmtPath};
pub use phase::*;
pub use step::StepRecord;
pub use values::Value;
