//! Control flow, positions and execution frame types

use super::super::errors::ExecutionException;
use super::ast::BlockSel;
use super::phase::{IfPhase, LoopPhase, RetryPhase, TryPhase};
use super::values::Value;
use serde::{Deserialize, Serialize};

/* ===================== Control Flow ===================== */

/// Control flow state
///
/// When control != None, the engine unwinds the frame stack looking for a
/// handler (`TryCatch` body or an armed `Retry`).
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    None,
    Throw(ExecutionException),
}

/* ===================== Positions ===================== */

/// Route from a code unit's root block down to a nested block
///
/// Each segment is `(statement index in the current block, child block of
/// that statement)`. The empty path is the unit's root block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPath(pub Vec<(usize, BlockSel)>);

impl BlockPath {
    pub fn root() -> Self {
        BlockPath(Vec::new())
    }

    /// Path of the block `sel` of the statement at `index` in this block
    pub fn child(&self, index: usize, sel: BlockSel) -> Self {
        let mut segs = self.0.clone();
        segs.push((index, sel));
        BlockPath(segs)
    }
}

/// Address of one statement inside a code unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StmtPath {
    pub block: BlockPath,
    pub index: usize,
}

impl StmtPath {
    pub fn new(block: BlockPath, index: usize) -> Self {
        Self { block, index }
    }

    pub fn child_block(&self, sel: BlockSel) -> BlockPath {
        self.block.child(self.index, sel)
    }
}

/* ===================== Frames ===================== */

/// Frame kind - the type and state of a construct being executed
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    /// Walks a block; `next` is the index of the statement to run next
    Block { path: BlockPath, next: usize },
    If { at: StmtPath, phase: IfPhase },
    While { at: StmtPath, phase: LoopPhase },
    DoWhile { at: StmtPath, phase: LoopPhase },
    Retry {
        at: StmtPath,
        phase: RetryPhase,
        attempt: u32,
        max: u32,
    },
    Try { at: StmtPath, phase: TryPhase },
}

/// Execution frame - one per active construct
///
/// `replay` caches call results of the construct's current evaluation so
/// that re-evaluating after a user function returns does not repeat them.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub replay: Vec<Value>,
}

impl Frame {
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            replay: Vec::new(),
        }
    }

    pub fn block(path: BlockPath, next: usize) -> Self {
        Frame::new(FrameKind::Block { path, next })
    }
}
