//! Expression evaluation
//!
//! Expressions are evaluated against a read-only `Scope`. Call results are
//! recorded in a per-statement replay list: when a user function has to run,
//! evaluation stops with `Interrupt::Call`, and after the function returns the
//! statement is evaluated again, taking every earlier call result from the
//! replay instead of calling a second time.

use super::errors::RuntimeError;
use super::program::Program;
use super::scope::Scope;
use super::stdlib::{self, convert, StdlibFunc};
use super::types::{BinaryOp, Expr, ProcedureCall, UnaryOp, Value};
use super::web;

/// Why evaluation stopped before producing a value
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    Fault(RuntimeError),
    /// A user function must run before evaluation can continue
    Call { name: String, args: Vec<Value> },
}

impl From<RuntimeError> for Interrupt {
    fn from(e: RuntimeError) -> Self {
        Interrupt::Fault(e)
    }
}

pub type EvalResult<T = Value> = Result<T, Interrupt>;

pub struct Evaluator<'a> {
    scope: &'a Scope,
    program: &'a Program,
    replay: &'a mut Vec<Value>,
    cursor: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(scope: &'a Scope, program: &'a Program, replay: &'a mut Vec<Value>) -> Self {
        Self {
            scope,
            program,
            replay,
            cursor: 0,
        }
    }

    pub fn scope(&self) -> &Scope {
        self.scope
    }

    /// Evaluate an expression to a value
    pub fn eval(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Num { v, .. } => Ok(Value::Num(*v)),
            Expr::Bool { v, .. } => Ok(Value::Bool(*v)),
            Expr::Null { .. } | Expr::NoOp { .. } => Ok(Value::Null),
            Expr::String { v, .. } => Ok(Value::Str(v.clone())),
            Expr::Var { name, .. } => Ok(self.scope.get(name)?.clone()),

            Expr::BinOp {
                left, op, right, ..
            } => match op {
                BinaryOp::And => {
                    let l = self.eval(left)?;
                    if !l.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.eval(right)?.is_truthy()))
                }
                BinaryOp::Or => {
                    let l = self.eval(left)?;
                    if l.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.eval(right)?.is_truthy()))
                }
                _ => {
                    let l = self.eval(left)?;
                    let r = self.eval(right)?;
                    Ok(binary_op(*op, &l, &r)?)
                }
            },

            Expr::UnaryOp { op, operand, .. } => {
                let v = self.eval(operand)?;
                Ok(unary_op(*op, &v)?)
            }

            Expr::Struct { object, attr, .. } => {
                let obj = self.eval(object)?;
                Ok(get_field(&obj, &attr.name)?)
            }

            Expr::Array { object, index, .. } => {
                let obj = self.eval(object)?;
                let idx = self.eval(index)?;
                Ok(get_index(&obj, &idx)?)
            }

            Expr::List { items, .. } => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::Array(values))
            }

            Expr::ProcedureCall(call) => self.call(call),
        }
    }

    /// Evaluate a call: declared web service, user function, then built-in
    pub fn call(&mut self, call: &ProcedureCall) -> EvalResult {
        let args = call
            .args
            .iter()
            .map(|a| self.eval(a))
            .collect::<EvalResult<Vec<_>>>()?;

        if let Some(cached) = self.replay.get(self.cursor) {
            self.cursor += 1;
            return Ok(cached.clone());
        }

        let result = if let Some(signature) = self.scope.web_signature(&call.name) {
            web::invoke(self.scope.host().as_ref(), &call.name, signature, args)?
        } else if self.program.function(&call.name).is_some() {
            return Err(Interrupt::Call {
                name: call.name.clone(),
                args,
            });
        } else if let Some(func) = StdlibFunc::from_name(&call.name) {
            stdlib::call_stdlib_func(func, &args)?
        } else {
            return Err(RuntimeError::UndefinedFunction(call.name.clone()).into());
        };

        self.replay.push(result.clone());
        self.cursor += 1;
        Ok(result)
    }
}

/* ===================== Operators ===================== */

/// Apply a (non short-circuit) binary operator
pub fn binary_op(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    use BinaryOp::*;

    match op {
        Add => match (l, r) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{}{}", l, r))),
            _ => Err(operand_error(op, l, r)),
        },
        Sub | Mul | Div | Mod => {
            let (Value::Num(a), Value::Num(b)) = (l, r) else {
                return Err(operand_error(op, l, r));
            };
            let (a, b) = (*a, *b);
            match op {
                Sub => Ok(Value::Num(a - b)),
                Mul => Ok(Value::Num(a * b)),
                Div if b == 0.0 => Err(RuntimeError::DivisionByZero),
                Div => Ok(Value::Num(a / b)),
                Mod if b == 0.0 => Err(RuntimeError::DivisionByZero),
                // floored modulo: the result takes the divisor's sign
                _ => Ok(Value::Num(a - b * (a / b).floor())),
            }
        }
        Eq => Ok(Value::Bool(l == r)),
        Ne => Ok(Value::Bool(l != r)),
        Lt | Gt | Le | Ge => {
            let ord = match (l, r) {
                (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => return Err(operand_error(op, l, r)),
            };
            let Some(ord) = ord else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                Lt => ord.is_lt(),
                Gt => ord.is_gt(),
                Le => ord.is_le(),
                _ => ord.is_ge(),
            }))
        }
        And => Ok(Value::Bool(l.is_truthy() && r.is_truthy())),
        Or => Ok(Value::Bool(l.is_truthy() || r.is_truthy())),
    }
}

fn operand_error(op: BinaryOp, l: &Value, r: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "Unsupported operands for {:?}: {} and {}",
        op,
        l.type_name(),
        r.type_name()
    ))
}

pub fn unary_op(op: UnaryOp, v: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOp::Neg | UnaryOp::Plus => match v {
            Value::Num(n) if op == UnaryOp::Neg => Ok(Value::Num(-n)),
            Value::Num(n) => Ok(Value::Num(*n)),
            other => Err(RuntimeError::type_error(format!(
                "Unary {:?} expects a number, got {}",
                op,
                other.type_name()
            ))),
        },
        UnaryOp::Int => convert::cast_int(v),
        UnaryOp::Float => convert::cast_float(v),
        UnaryOp::Str => Ok(Value::Str(v.to_string())),
        UnaryOp::Bool => Ok(Value::Bool(v.is_truthy())),
    }
}

/* ===================== Composite Access ===================== */

pub fn get_field(obj: &Value, name: &str) -> Result<Value, RuntimeError> {
    match obj {
        Value::Struct(fields) => fields
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::PropertyNotFound(name.to_string())),
        Value::Error(info) => match name {
            "code" => Ok(Value::Str(info.code.clone())),
            "message" => Ok(Value::Str(info.message.clone())),
            _ => Err(RuntimeError::PropertyNotFound(name.to_string())),
        },
        other => Err(RuntimeError::type_error(format!(
            "Cannot access property '{}' on {} value",
            name,
            other.type_name()
        ))),
    }
}

pub fn get_index(obj: &Value, idx: &Value) -> Result<Value, RuntimeError> {
    match (obj, idx) {
        (Value::Struct(_), Value::Str(key)) => get_field(obj, key),
        (Value::Array(items), _) => {
            let i = index_value(idx)?;
            usize::try_from(i)
                .ok()
                .and_then(|u| items.get(u))
                .cloned()
                .ok_or(RuntimeError::IndexOutOfRange {
                    index: i,
                    len: items.len(),
                })
        }
        (Value::Str(s), _) => {
            let i = index_value(idx)?;
            usize::try_from(i)
                .ok()
                .and_then(|u| s.chars().nth(u))
                .map(|c| Value::Str(c.to_string()))
                .ok_or(RuntimeError::IndexOutOfRange {
                    index: i,
                    len: s.chars().count(),
                })
        }
        (other, _) => Err(RuntimeError::type_error(format!(
            "Cannot index into {} value",
            other.type_name()
        ))),
    }
}

/// Integral index from a numeric value
pub fn index_value(idx: &Value) -> Result<i64, RuntimeError> {
    match idx {
        Value::Num(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        other => Err(RuntimeError::type_error(format!(
            "Index must be an integer, got {}",
            other
        ))),
    }
}
