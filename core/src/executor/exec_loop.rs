//! Core execution loop
//!
//! `Engine::step` drives micro-steps until one statement has executed. Each
//! micro-step looks at the top frame of the innermost activation and
//! dispatches to its handler; structured statements only move frames around,
//! so several micro-steps can pass before a record comes out.
//!
//! ## Function Organization
//! 1. run_until_done() - Top-level driver (calls step repeatedly)
//! 2. step() - Runs micro-steps until a record, the end, or a fault
//! 3. tick() - One micro-step (dispatches to statement handlers)
//! 4. advance_to_statement() - Moves through frames up to the next simple statement
//! 5. unwind() - Fault propagation through frames, subroutines and functions

use super::errors::{ExecutionException, RuntimeError};
use super::program::Unit;
use super::statements::{execute_block, execute_if, execute_loop, execute_retry, execute_try};
use super::types::{
    BlockSel, Control, Frame, FrameKind, IfPhase, LoopPhase, RetryPhase, StepRecord, Stmt, StmtPath,
    TryPhase, Value,
};
use super::vm::{enter_frames, restore_bindings, Engine, Tick};
use std::sync::Arc;
use tracing::{debug, error};

/* ===================== Public API ===================== */

impl Engine {
    /// Execute statements until the run ends
    ///
    /// Delays and suspensions are not honored here; use the async `Runner`
    /// for that.
    pub fn run_until_done(&mut self) -> Result<Vec<StepRecord>, ExecutionException> {
        let mut records = Vec::new();
        while let Some(record) = self.step()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Execute the next statement
    ///
    /// Returns `Ok(None)` once the run has ended. An unrecovered fault is
    /// returned once as `Err`, after which the engine is finished.
    pub fn step(&mut self) -> Result<Option<StepRecord>, ExecutionException> {
        if self.finished {
            return Ok(None);
        }

        loop {
            match self.tick() {
                Tick::Continue => continue,
                Tick::Record(record) => {
                    if self.activations.is_empty() {
                        self.finished = true;
                    }
                    return Ok(Some(record));
                }
                Tick::Done => {
                    self.finished = true;
                    return Ok(None);
                }
                Tick::Failed(exception) => {
                    self.finished = true;
                    return Err(exception);
                }
            }
        }
    }

    /// Advance to the next simple statement without running it
    ///
    /// Closes finished blocks and enters structured statements, evaluating
    /// their headers on the way. Stops early before a header whose line
    /// satisfies `stop_at`, and before a fault starts unwinding. Afterwards
    /// `next_line` names what the next `step` runs; a main program with
    /// nothing left becomes finished.
    pub fn advance_to_statement<F>(&mut self, stop_at: F)
    where
        F: Fn(u32) -> bool,
    {
        while !self.finished && self.control == Control::None && !self.cancel.is_cancelled()
        {
            match self.pending_header() {
                Pending::Statement => break,
                Pending::Header(line) if stop_at(line) => break,
                Pending::Header(_) | Pending::Frame => {}
            }
            match self.tick() {
                Tick::Continue => {}
                Tick::Done => self.finished = true,
                // only simple statements record, and no fault is active
                Tick::Record(_) | Tick::Failed(_) => break,
            }
        }
    }

    /// What the next micro-step will do
    fn pending_header(&self) -> Pending {
        let Some(act) = self.activations.last() else {
            return Pending::Frame;
        };
        let Some(frame) = act.frames.last() else {
            return Pending::Frame;
        };
        let header = |at: &StmtPath| Pending::Header(self.program.stmt(&act.unit, at).line());
        match &frame.kind {
            FrameKind::Block { path, next } => {
                let at = StmtPath::new(path.clone(), *next);
                match self.program.block(&act.unit, path).body.get(*next) {
                    Some(stmt) if enter_frames(stmt, &at).is_empty() => Pending::Statement,
                    _ => Pending::Frame,
                }
            }
            FrameKind::If { at, phase: IfPhase::Test }
            | FrameKind::While { at, phase: LoopPhase::Test }
            | FrameKind::DoWhile { at, phase: LoopPhase::Test }
            | FrameKind::Retry {
                at,
                phase: RetryPhase::Enter | RetryPhase::Test,
                ..
            } => header(at),
            _ => Pending::Frame,
        }
    }

    /// One micro-step
    fn tick(&mut self) -> Tick {
        if self.control == Control::None
            && !self.activations.is_empty()
            && self.cancel.is_cancelled()
        {
            let line = self.next_line();
            self.raise(line, RuntimeError::Cancelled);
        }

        if self.control != Control::None {
            return unwind(self);
        }

        let Some(act) = self.activations.last() else {
            return Tick::Done;
        };

        let Some(kind) = act.frames.last().map(|f| f.kind.clone()) else {
            // Unit ran off its end
            if act.unit == Unit::Main {
                self.activations.clear();
                return Tick::Done;
            }
            self.return_from_function(Value::Null);
            return Tick::Continue;
        };

        match kind {
            FrameKind::Block { path, next } => execute_block(self, path, next),
            FrameKind::If { at, phase } => execute_if(self, at, phase),
            FrameKind::While { at, phase } => execute_loop(self, at, phase, false),
            FrameKind::DoWhile { at, phase } => execute_loop(self, at, phase, true),
            FrameKind::Retry {
                at,
                phase,
                attempt,
                max,
            } => execute_retry(self, at, phase, attempt, max),
            FrameKind::Try { phase, .. } => execute_try(self, phase),
        }
    }
}

/// Next micro-step, as seen by `advance_to_statement`
enum Pending {
    /// A simple statement runs (and records)
    Statement,
    /// A structured statement evaluates its header on this line
    Header(u32),
    /// Frame bookkeeping only
    Frame,
}

/* ===================== Control Flow ===================== */

/// Unwind the stack while a fault is active
///
/// Pops frames of the innermost activation until a handler takes the fault:
/// a `TryCatch` still running its body, or a `Retry` with attempts left.
/// When an activation runs out of frames, the fault moves on to the caller of
/// the innermost subroutine, then to the caller of the function. A fault that
/// leaves the main program ends the run.
fn unwind(engine: &mut Engine) -> Tick {
    let Control::Throw(exception) = std::mem::replace(&mut engine.control, Control::None) else {
        return Tick::Continue;
    };

    if exception.cause.is_terminal() {
        engine.activations.clear();
        error!(line = exception.line, error = %exception, "run aborted");
        return Tick::Failed(exception);
    }

    let program = Arc::clone(&engine.program);

    while let Some(act) = engine.activations.last_mut() {
        while let Some(frame) = act.frames.pop() {
            match frame.kind {
                FrameKind::Try {
                    at,
                    phase: TryPhase::Body,
                } => {
                    let stmt = program.stmt(&act.unit, &at);
                    let Stmt::TryCatch { catch_var, .. } = stmt else {
                        panic!("Frame kind does not match statement node");
                    };
                    let catch = Frame::block(at.child_block(BlockSel::Catch), 0);
                    act.frames.push(Frame::new(FrameKind::Try {
                        at,
                        phase: TryPhase::Catch,
                    }));
                    act.frames.push(catch);
                    debug!(line = exception.line, "fault caught");

                    if let Some(var) = catch_var {
                        if let Err(e) = engine.scope.set(var, exception.cause.payload()) {
                            engine.raise(stmt.line(), e);
                        }
                    }
                    return Tick::Continue;
                }

                FrameKind::Retry {
                    at,
                    phase: RetryPhase::Body,
                    attempt,
                    max,
                } if attempt < max => {
                    debug!(
                        line = exception.line,
                        attempt = attempt + 1,
                        max,
                        "fault in retry body, restarting"
                    );
                    let body = Frame::block(at.child_block(BlockSel::Body), 0);
                    act.frames.push(Frame::new(FrameKind::Retry {
                        at,
                        phase: RetryPhase::Body,
                        attempt: attempt + 1,
                        max,
                    }));
                    act.frames.push(body);
                    return Tick::Continue;
                }

                _ => {}
            }
        }

        if let Some(frames) = act.subroutines.pop() {
            act.frames = frames;
            continue;
        }

        if act.unit == Unit::Main {
            break;
        }

        if let Some(finished) = engine.activations.pop() {
            restore_bindings(&mut engine.scope, finished.saved);
        }
    }

    engine.activations.clear();
    error!(line = exception.line, error = %exception, "unhandled fault");
    Tick::Failed(exception)
}
