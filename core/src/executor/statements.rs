//! Statement execution handlers
//!
//! `execute_block` walks a block: structured statements push their frames,
//! simple statements run to completion and yield one record. The remaining
//! handlers drive the phases of the structured statements.

use super::assign;
use super::errors::{ErrorInfo, RuntimeError, USER_ERROR};
use super::expressions::{EvalResult, Interrupt};
use super::program::Unit;
use super::scope::WebSignature;
use super::types::{
    BlockPath, BlockSel, Expr, Frame, FrameKind, IfPhase, LoopPhase, RetryPhase, StepRecord,
    Stmt, StmtPath, TryPhase, Value,
};
use super::vm::{enter_frames, Engine, Tick};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What a completed simple statement asks the engine to do
#[derive(Debug)]
enum Effect {
    Value(Option<Value>),
    Jump(String),
    Sub(String),
    Return(Option<Value>),
    Exit(Option<Value>),
    Delay(Duration, Value),
    Suspend,
}

/* ===================== Block ===================== */

pub(crate) fn execute_block(engine: &mut Engine, path: BlockPath, next: usize) -> Tick {
    let program = Arc::clone(&engine.program);
    let unit = engine.current_unit();
    let block = program.block(&unit, &path);

    let Some(stmt) = block.body.get(next) else {
        engine.pop_frame();
        return Tick::Continue;
    };
    let at = StmtPath::new(path.clone(), next);

    let frames = enter_frames(stmt, &at);
    if !frames.is_empty() {
        engine.set_top_kind(FrameKind::Block {
            path,
            next: next + 1,
        });
        for frame in frames {
            engine.push_frame(frame);
        }
        return Tick::Continue;
    }

    let line = stmt.line();
    match execute_simple(engine, stmt) {
        Ok(effect) => {
            engine.set_top_kind(FrameKind::Block {
                path,
                next: next + 1,
            });
            apply_effect(engine, line, effect)
        }
        Err(Interrupt::Fault(e)) => {
            engine.raise(line, e);
            Tick::Continue
        }
        Err(Interrupt::Call { name, args }) => {
            engine.call_function(line, name, args);
            Tick::Continue
        }
    }
}

/// Run a simple statement; nothing here touches the frame stack
fn execute_simple(engine: &mut Engine, stmt: &Stmt) -> EvalResult<Effect> {
    match stmt {
        Stmt::Assign {
            targets,
            op,
            values,
            line,
        } => {
            let strict = engine.options.strict_output_params;
            let plan = engine.eval_with(|ev| assign::plan(ev, targets, *op, values, strict))?;
            let value = plan.record_value();
            for missing in plan.missing {
                engine.warn_missing_output(*line, missing.service, missing.param);
            }
            assign::bind(&mut engine.scope, plan.bindings)?;
            Ok(Effect::Value(Some(value)))
        }

        Stmt::Const { bindings, .. } => {
            let values = engine.eval_with(|ev| {
                bindings
                    .iter()
                    .map(|b| ev.eval(&b.value))
                    .collect::<EvalResult<Vec<_>>>()
            })?;
            for (binding, value) in bindings.iter().zip(values.iter()) {
                engine.scope.set(&binding.name, value.clone())?;
                engine.scope.declare_const(&binding.name)?;
            }
            let value = match values.as_slice() {
                [single] => single.clone(),
                _ => Value::Array(values),
            };
            Ok(Effect::Value(Some(value)))
        }

        Stmt::Label { .. } | Stmt::NoOp { .. } | Stmt::FunctionDecl { .. } => {
            Ok(Effect::Value(None))
        }

        Stmt::GoToCall { label, .. } => Ok(Effect::Jump(label.clone())),

        Stmt::SubCall { label, .. } => Ok(Effect::Sub(label.clone())),

        Stmt::Return { value, .. } => {
            let value = match value {
                Some(expr) => Some(engine.eval_with(|ev| ev.eval(expr))?),
                None => None,
            };
            Ok(Effect::Return(value))
        }

        Stmt::Exit { status, .. } => {
            let status = match status {
                Some(expr) => Some(engine.eval_with(|ev| ev.eval(expr))?),
                None => None,
            };
            Ok(Effect::Exit(status))
        }

        Stmt::Error { message, code, .. } => {
            let (message, code) = engine.eval_with(|ev| {
                let message = ev.eval(message)?;
                let code = match code {
                    Some(c) => Some(ev.eval(c)?),
                    None => None,
                };
                Ok((message, code))
            })?;
            let code = code
                .map(|c| c.to_string())
                .unwrap_or_else(|| USER_ERROR.to_string());
            let error = Value::Error(ErrorInfo::new(code, message.to_string()));
            Err(RuntimeError::Thrown(error).into())
        }

        Stmt::Throw { value, .. } => {
            let value = engine.eval_with(|ev| ev.eval(value))?;
            Err(RuntimeError::Thrown(value).into())
        }

        Stmt::Delay { duration, .. } => {
            let value = engine.eval_with(|ev| ev.eval(duration))?;
            let ms = value.as_num().ok_or_else(|| {
                RuntimeError::type_error(format!(
                    "Delay expects milliseconds, got {}",
                    value.type_name()
                ))
            })?;
            let scaled = ms * engine.options.delay_multiplier;
            let delay = Duration::try_from_secs_f64(scaled.max(0.0) / 1000.0)
                .map_err(|_| RuntimeError::type_error(format!("Invalid delay {}", ms)))?;
            Ok(Effect::Delay(delay, value))
        }

        Stmt::Suspend { .. } => Ok(Effect::Suspend),

        Stmt::Status { text, line } => {
            let text = engine.eval_with(|ev| ev.eval(text))?.to_string();
            engine.scope.host().report_status(&text);
            info!(line, status = %text, "status");
            Ok(Effect::Value(Some(Value::Str(text))))
        }

        Stmt::DeclareWeb {
            name,
            params,
            outputs,
            alias,
            url,
            ..
        } => {
            let url = match url {
                Some(expr) => Some(engine.eval_with(|ev| ev.eval(expr))?.to_string()),
                None => None,
            };
            let signature = WebSignature {
                service: name.clone(),
                params: params.clone(),
                outputs: outputs.clone(),
                url,
            };
            engine
                .scope
                .declare_web(alias.as_deref().unwrap_or(name), signature);
            Ok(Effect::Value(None))
        }

        Stmt::ProcedureCall(call) => {
            let value = engine.eval_with(|ev| ev.call(call))?;
            Ok(Effect::Value(Some(value)))
        }

        Stmt::Input { name, .. } => {
            if !engine.scope.contains(name) {
                engine.scope.set(name, Value::Null)?;
            }
            Ok(Effect::Value(Some(engine.scope.get(name)?.clone())))
        }

        Stmt::Compound(_)
        | Stmt::Condition { .. }
        | Stmt::Cycle { .. }
        | Stmt::DoCycle { .. }
        | Stmt::Retry { .. }
        | Stmt::TryCatch { .. }
        | Stmt::Include { .. }
        | Stmt::Comment { .. }
        | Stmt::Doc { .. } => panic!("Internal error: not a simple statement: {:?}", stmt),
    }
}

/// Apply a completed statement's effect and produce its record
fn apply_effect(engine: &mut Engine, line: u32, effect: Effect) -> Tick {
    let value = match effect {
        Effect::Value(v) => v,
        Effect::Jump(label) => {
            if let Err(e) = engine.jump(&label) {
                engine.raise(line, e);
                return Tick::Continue;
            }
            None
        }
        Effect::Sub(label) => {
            if let Err(e) = engine.gosub(&label) {
                engine.raise(line, e);
                return Tick::Continue;
            }
            None
        }
        Effect::Return(v) => {
            execute_return(engine, v.clone());
            v
        }
        Effect::Exit(status) => {
            info!(line, status = ?status, "exit");
            engine.terminate(status.clone());
            status
        }
        Effect::Delay(delay, v) => {
            engine.pending_delay = Some(delay);
            Some(v)
        }
        Effect::Suspend => {
            engine.suspended = true;
            None
        }
    };

    let record = StepRecord::new(line, value, engine.next_line());
    debug!(line, next_line = record.next_line, "step");
    Tick::Record(record)
}

/// Return from the innermost subroutine, function, or the program
fn execute_return(engine: &mut Engine, value: Option<Value>) {
    let Some(act) = engine.activations.last_mut() else {
        return;
    };
    if let Some(frames) = act.subroutines.pop() {
        act.frames = frames;
    } else if let Unit::Function(_) = act.unit {
        engine.return_from_function(value.unwrap_or(Value::Null));
    } else {
        engine.terminate(value);
    }
}

/* ===================== Structured Statements ===================== */

/// Settle an evaluation result, starting a fault or a function call
fn settle<T>(engine: &mut Engine, line: u32, result: EvalResult<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(Interrupt::Fault(e)) => {
            engine.raise(line, e);
            None
        }
        Err(Interrupt::Call { name, args }) => {
            engine.call_function(line, name, args);
            None
        }
    }
}

/// Line a header expression faults on: its own line when it carries one
fn header_line(test: &Expr, stmt_line: u32) -> u32 {
    match test.line() {
        0 => stmt_line,
        line => line,
    }
}

pub(crate) fn execute_if(engine: &mut Engine, at: StmtPath, phase: IfPhase) -> Tick {
    let program = Arc::clone(&engine.program);
    let unit = engine.current_unit();
    let Stmt::Condition {
        branches,
        else_block,
        line,
    } = program.stmt(&unit, &at)
    else {
        panic!("Frame kind does not match statement node");
    };

    match phase {
        IfPhase::Branch => {
            engine.pop_frame();
            Tick::Continue
        }
        IfPhase::Test => {
            let mut tested = 0;
            let result = engine.eval_with(|ev| {
                for (i, branch) in branches.iter().enumerate() {
                    tested = i;
                    if ev.eval(&branch.test)?.is_truthy() {
                        return Ok(Some(i));
                    }
                }
                Ok(None)
            });
            let test_line = branches
                .get(tested)
                .map_or(*line, |b| header_line(&b.test, *line));
            let Some(chosen) = settle(engine, test_line, result) else {
                return Tick::Continue;
            };

            let sel = match chosen {
                Some(i) => BlockSel::Branch(i),
                None if else_block.is_some() => BlockSel::Else,
                None => {
                    engine.pop_frame();
                    return Tick::Continue;
                }
            };
            engine.set_top_kind(FrameKind::If {
                at: at.clone(),
                phase: IfPhase::Branch,
            });
            engine.push_frame(Frame::block(at.child_block(sel), 0));
            Tick::Continue
        }
    }
}

/// Drives both `Cycle` (pre-test) and `DoCycle` (post-test) frames
pub(crate) fn execute_loop(
    engine: &mut Engine,
    at: StmtPath,
    phase: LoopPhase,
    post_test: bool,
) -> Tick {
    let kind = |at: StmtPath, phase: LoopPhase| {
        if post_test {
            FrameKind::DoWhile { at, phase }
        } else {
            FrameKind::While { at, phase }
        }
    };

    match phase {
        LoopPhase::Body => {
            engine.set_top_kind(kind(at, LoopPhase::Test));
            Tick::Continue
        }
        LoopPhase::Test => {
            let program = Arc::clone(&engine.program);
            let unit = engine.current_unit();
            let stmt = program.stmt(&unit, &at);
            let (Stmt::Cycle { test, .. } | Stmt::DoCycle { test, .. }) = stmt else {
                panic!("Frame kind does not match statement node");
            };

            let result = engine.eval_with(|ev| Ok(ev.eval(test)?.is_truthy()));
            let Some(again) = settle(engine, header_line(test, stmt.line()), result) else {
                return Tick::Continue;
            };

            if again {
                let body = Frame::block(at.child_block(BlockSel::Body), 0);
                engine.set_top_kind(kind(at, LoopPhase::Body));
                engine.push_frame(body);
            } else {
                engine.pop_frame();
            }
            Tick::Continue
        }
    }
}

pub(crate) fn execute_retry(
    engine: &mut Engine,
    at: StmtPath,
    phase: RetryPhase,
    attempt: u32,
    max: u32,
) -> Tick {
    let program = Arc::clone(&engine.program);
    let unit = engine.current_unit();
    let Stmt::Retry {
        attempts,
        test,
        line,
        ..
    } = program.stmt(&unit, &at)
    else {
        panic!("Frame kind does not match statement node");
    };

    match phase {
        RetryPhase::Enter => {
            let result = engine.eval_with(|ev| {
                let v = ev.eval(attempts)?;
                match v.as_num() {
                    Some(n) if !n.is_nan() => Ok(n),
                    _ => Err(RuntimeError::type_error(format!(
                        "Retry expects a number of attempts, got {}",
                        v.type_name()
                    ))
                    .into()),
                }
            });
            let Some(n) = settle(engine, header_line(attempts, *line), result) else {
                return Tick::Continue;
            };
            let max = n.clamp(1.0, u32::MAX as f64) as u32;
            start_attempt(engine, at, 1, max);
            Tick::Continue
        }
        RetryPhase::Body => {
            if test.is_some() {
                engine.set_top_kind(FrameKind::Retry {
                    at,
                    phase: RetryPhase::Test,
                    attempt,
                    max,
                });
            } else {
                engine.pop_frame();
            }
            Tick::Continue
        }
        RetryPhase::Test => {
            let Some(test) = test else {
                engine.pop_frame();
                return Tick::Continue;
            };
            let result = engine.eval_with(|ev| Ok(ev.eval(test)?.is_truthy()));
            let Some(again) = settle(engine, header_line(test, *line), result) else {
                return Tick::Continue;
            };
            if again && attempt < max {
                debug!(attempt = attempt + 1, max, "retry condition holds, restarting body");
                start_attempt(engine, at, attempt + 1, max);
            } else {
                engine.pop_frame();
            }
            Tick::Continue
        }
    }
}

/// Put the retry frame in its body phase and start the body over
pub(crate) fn start_attempt(engine: &mut Engine, at: StmtPath, attempt: u32, max: u32) {
    let body = Frame::block(at.child_block(BlockSel::Body), 0);
    engine.set_top_kind(FrameKind::Retry {
        at,
        phase: RetryPhase::Body,
        attempt,
        max,
    });
    engine.push_frame(body);
}

/// Either block of a `TryCatch` finished normally
pub(crate) fn execute_try(engine: &mut Engine, _phase: TryPhase) -> Tick {
    engine.pop_frame();
    Tick::Continue
}
