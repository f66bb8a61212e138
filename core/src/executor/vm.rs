//! Engine state
//!
//! The engine holds all execution state:
//! - activations: one per running code unit (main program, then each active
//!   user function call on top)
//! - control: current control flow state (a fault being unwound)
//! - the run's `Scope` plus flags surfaced to the host (delay, suspension,
//!   exit status, warnings)

use super::errors::{ExecutionException, RuntimeError, RuntimeWarning};
use super::expressions::{EvalResult, Evaluator, Interrupt};
use super::program::{Program, Unit};
use super::scope::Scope;
use super::types::{
    BlockPath, BlockSel, Control, Frame, FrameKind, IfPhase, LoopPhase, RetryPhase, StepRecord,
    Stmt, StmtPath, TryPhase, Value,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/* ===================== Options ===================== */

/// Per-run tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Factor applied to every `Delay` duration
    pub delay_multiplier: f64,
    /// Fault instead of binding `""` when a declared output is missing
    pub strict_output_params: bool,
    /// Limit for nested function calls and for nested subroutine calls
    pub max_call_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            delay_multiplier: 1.0,
            strict_output_params: false,
            max_call_depth: 256,
        }
    }
}

/* ===================== Activation ===================== */

/// A running code unit
#[derive(Debug, Clone)]
pub struct Activation {
    pub unit: Unit,
    /// Stack of active constructs, innermost last
    pub frames: Vec<Frame>,
    /// Frame stacks saved by `SubCall`, restored by `Return`
    pub subroutines: Vec<Vec<Frame>>,
    /// Bindings shadowed by this call's parameters
    pub saved: Vec<(String, Option<Value>)>,
}

impl Activation {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            frames: vec![Frame::block(BlockPath::root(), 0)],
            subroutines: Vec::new(),
            saved: Vec::new(),
        }
    }
}

/* ===================== Micro-step Result ===================== */

/// Result of one micro-step
#[derive(Debug)]
pub(crate) enum Tick {
    /// Frames changed; keep going
    Continue,
    /// A statement executed
    Record(StepRecord),
    /// Nothing left to run
    Done,
    /// A fault escaped every handler
    Failed(ExecutionException),
}

/* ===================== Engine ===================== */

pub struct Engine {
    pub(crate) program: Arc<Program>,
    pub(crate) scope: Scope,
    pub(crate) options: EngineOptions,
    pub(crate) activations: Vec<Activation>,
    pub(crate) control: Control,
    pub(crate) finished: bool,
    pub(crate) exit_status: Option<Value>,
    pub(crate) pending_delay: Option<Duration>,
    pub(crate) suspended: bool,
    pub(crate) warnings: Vec<RuntimeWarning>,
    pub(crate) cancel: CancellationToken,
}

impl Engine {
    pub fn new(program: Arc<Program>, scope: Scope, options: EngineOptions) -> Self {
        Engine {
            program,
            scope,
            options,
            activations: vec![Activation::new(Unit::Main)],
            control: Control::None,
            finished: false,
            exit_status: None,
            pending_delay: None,
            suspended: false,
            warnings: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Status of `Exit`, or the value of a top-level `Return`
    pub fn exit_status(&self) -> Option<&Value> {
        self.exit_status.as_ref()
    }

    pub fn warnings(&self) -> &[RuntimeWarning] {
        &self.warnings
    }

    /// Delay requested by the last `Delay` statement, if not yet taken
    pub fn take_delay(&mut self) -> Option<Duration> {
        self.pending_delay.take()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// Line execution resumes at
    pub fn next_line(&self) -> u32 {
        let program = &self.program;
        let Some(act) = self.activations.last() else {
            return program.root().end_line;
        };
        let Some(frame) = act.frames.last() else {
            return program.unit_root(&act.unit).end_line;
        };
        match &frame.kind {
            FrameKind::Block { path, next } => program.block(&act.unit, path).line_at(*next),
            FrameKind::If { at, .. }
            | FrameKind::While { at, .. }
            | FrameKind::DoWhile { at, .. }
            | FrameKind::Retry { at, .. }
            | FrameKind::Try { at, .. } => program.stmt(&act.unit, at).line(),
        }
    }

    /* ===================== Frame Access ===================== */

    pub(crate) fn top_frame(&mut self) -> Option<&mut Frame> {
        self.activations.last_mut().and_then(|a| a.frames.last_mut())
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        if let Some(act) = self.activations.last_mut() {
            act.frames.push(frame);
        }
    }

    pub(crate) fn pop_frame(&mut self) {
        if let Some(act) = self.activations.last_mut() {
            act.frames.pop();
        }
    }

    /// Replace the top frame's kind (phase transitions)
    pub(crate) fn set_top_kind(&mut self, kind: FrameKind) {
        if let Some(frame) = self.top_frame() {
            frame.kind = kind;
        }
    }

    pub(crate) fn current_unit(&self) -> Unit {
        self.activations
            .last()
            .map(|a| a.unit.clone())
            .unwrap_or(Unit::Main)
    }

    /// Evaluate with the top frame's replay cache
    ///
    /// The cache is cleared once evaluation produces a value or a fault, and
    /// kept when it stops for a user function call.
    pub(crate) fn eval_with<T>(
        &mut self,
        f: impl FnOnce(&mut Evaluator<'_>) -> EvalResult<T>,
    ) -> EvalResult<T> {
        let program = Arc::clone(&self.program);
        let mut scratch = Vec::new();
        let replay = match self.activations.last_mut().and_then(|a| a.frames.last_mut()) {
            Some(frame) => &mut frame.replay,
            None => &mut scratch,
        };

        let mut ev = Evaluator::new(&self.scope, &program, replay);
        let result = f(&mut ev);

        if !matches!(result, Err(Interrupt::Call { .. })) {
            replay.clear();
        }
        result
    }

    /* ===================== Faults ===================== */

    /// Start unwinding with a fault raised by the statement on `line`
    pub(crate) fn raise(&mut self, line: u32, cause: RuntimeError) {
        if let Some(frame) = self.top_frame() {
            frame.replay.clear();
        }
        let exception = ExecutionException::new(line, cause);
        debug!(line, error = %exception, "fault raised");
        self.scope.set_exception_message(exception.to_string());
        self.control = Control::Throw(exception);
    }

    pub(crate) fn warn_missing_output(&mut self, line: u32, service: String, param: String) {
        warn!(
            line,
            service = %service,
            param = %param,
            "output parameter missing in service response"
        );
        self.warnings.push(RuntimeWarning::MissingOutputParameter {
            line,
            service,
            param,
        });
    }

    /* ===================== Jumps ===================== */

    /// Continue after `label` in the current unit
    pub(crate) fn jump(&mut self, label: &str) -> Result<(), RuntimeError> {
        let program = Arc::clone(&self.program);
        let Some(act) = self.activations.last_mut() else {
            return Ok(());
        };
        let target = program
            .label(&act.unit, label)
            .ok_or_else(|| RuntimeError::UndefinedLabel(label.to_string()))?;
        act.frames = rebuild_frames(&program, &act.unit, target);
        debug!(label, "jump");
        Ok(())
    }

    /// Save the current position and jump
    pub(crate) fn gosub(&mut self, label: &str) -> Result<(), RuntimeError> {
        let max = self.options.max_call_depth;
        let Some(act) = self.activations.last_mut() else {
            return Ok(());
        };
        if act.subroutines.len() >= max {
            return Err(RuntimeError::CallDepthExceeded(max));
        }
        if self.program.label(&act.unit, label).is_none() {
            return Err(RuntimeError::UndefinedLabel(label.to_string()));
        }
        act.subroutines.push(act.frames.clone());
        self.jump(label)
    }

    /* ===================== Functions ===================== */

    /// Start a user function call requested by the statement on `line`
    pub(crate) fn call_function(&mut self, line: u32, name: String, args: Vec<Value>) {
        let program = Arc::clone(&self.program);
        let Some(def) = program.function(&name) else {
            self.raise(line, RuntimeError::UndefinedFunction(name));
            return;
        };
        if self.activations.len() > self.options.max_call_depth {
            self.raise(line, RuntimeError::CallDepthExceeded(self.options.max_call_depth));
            return;
        }
        if def.params.len() != args.len() {
            self.raise(
                line,
                RuntimeError::WrongArgCount {
                    function: name,
                    expected: def.params.len(),
                    got: args.len(),
                },
            );
            return;
        }

        let mut saved = Vec::with_capacity(args.len());
        for (param, arg) in def.params.iter().zip(args) {
            let previous = self.scope.get(param).ok().cloned();
            if let Err(e) = self.scope.set(param, arg) {
                restore_bindings(&mut self.scope, saved);
                self.raise(line, e);
                return;
            }
            saved.push((param.clone(), previous));
        }

        debug!(function = %name, depth = self.activations.len(), "enter function");
        let mut activation = Activation::new(Unit::Function(name));
        activation.saved = saved;
        self.activations.push(activation);
    }

    /// Leave the current function, handing `value` to the caller's replay
    pub(crate) fn return_from_function(&mut self, value: Value) {
        let Some(act) = self.activations.pop() else {
            return;
        };
        restore_bindings(&mut self.scope, act.saved);
        debug!(unit = ?act.unit, "leave function");
        if let Some(frame) = self.top_frame() {
            frame.replay.push(value);
        }
    }

    /// End the whole run
    pub(crate) fn terminate(&mut self, status: Option<Value>) {
        self.activations.clear();
        self.exit_status = status;
    }
}

pub(crate) fn restore_bindings(scope: &mut Scope, saved: Vec<(String, Option<Value>)>) {
    for (name, previous) in saved.into_iter().rev() {
        scope.restore(&name, previous);
    }
}

/* ===================== Frame Construction ===================== */

/// Frames that start a structured statement
pub(crate) fn enter_frames(stmt: &Stmt, at: &StmtPath) -> Vec<Frame> {
    let at = at.clone();
    match stmt {
        Stmt::Compound(_) | Stmt::Include { .. } => {
            vec![Frame::block(at.child_block(BlockSel::Body), 0)]
        }
        Stmt::Condition { .. } => vec![Frame::new(FrameKind::If {
            at,
            phase: IfPhase::Test,
        })],
        Stmt::Cycle { .. } => vec![Frame::new(FrameKind::While {
            at,
            phase: LoopPhase::Test,
        })],
        Stmt::DoCycle { .. } => {
            let body = Frame::block(at.child_block(BlockSel::Body), 0);
            vec![
                Frame::new(FrameKind::DoWhile {
                    at,
                    phase: LoopPhase::Body,
                }),
                body,
            ]
        }
        Stmt::Retry { .. } => vec![Frame::new(FrameKind::Retry {
            at,
            phase: RetryPhase::Enter,
            attempt: 0,
            max: 0,
        })],
        Stmt::TryCatch { .. } => {
            let body = Frame::block(at.child_block(BlockSel::Body), 0);
            vec![
                Frame::new(FrameKind::Try {
                    at,
                    phase: TryPhase::Body,
                }),
                body,
            ]
        }
        _ => Vec::new(),
    }
}

/// Frame stack for resuming right after the label at `target`
///
/// Every enclosing construct gets its frame in the phase that is running the
/// block the label lives in, so loops keep looping after the jump.
pub(crate) fn rebuild_frames(program: &Program, unit: &Unit, target: &StmtPath) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut path = BlockPath::root();

    for &(index, sel) in &target.block.0 {
        frames.push(Frame::block(path.clone(), index + 1));
        let at = StmtPath::new(path.clone(), index);
        let kind = match (program.stmt(unit, &at), sel) {
            (Stmt::Condition { .. }, _) => Some(FrameKind::If {
                at,
                phase: IfPhase::Branch,
            }),
            (Stmt::Cycle { .. }, _) => Some(FrameKind::While {
                at,
                phase: LoopPhase::Body,
            }),
            (Stmt::DoCycle { .. }, _) => Some(FrameKind::DoWhile {
                at,
                phase: LoopPhase::Body,
            }),
            (Stmt::Retry { .. }, _) => Some(FrameKind::Retry {
                at,
                phase: RetryPhase::Body,
                attempt: 1,
                max: 1,
            }),
            (Stmt::TryCatch { .. }, BlockSel::Catch) => Some(FrameKind::Try {
                at,
                phase: TryPhase::Catch,
            }),
            (Stmt::TryCatch { .. }, _) => Some(FrameKind::Try {
                at,
                phase: TryPhase::Body,
            }),
            _ => None,
        };
        if let Some(kind) = kind {
            frames.push(Frame::new(kind));
        }
        path = path.child(index, sel);
    }

    frames.push(Frame::block(path, target.index + 1));
    frames
}
