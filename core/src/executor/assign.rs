//! Assignment targets and multi-value binding
//!
//! Assignment runs in two halves. `plan` evaluates everything (values,
//! index expressions, compound operands, web responses) without touching the
//! scope, so it can be interrupted by a user function call and replayed.
//! `bind` then writes the results.

use super::errors::RuntimeError;
use super::expressions::{binary_op, get_field, get_index, index_value, EvalResult, Evaluator};
use super::scope::Scope;
use super::types::{AssignOp, Expr, Value};
use super::web;

/// Resolved assignment target
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Var(String),
    Path { root: String, keys: Vec<Key> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Field(String),
    Index(i64),
}

/// A declared output that the service response did not contain
#[derive(Debug, Clone, PartialEq)]
pub struct MissingOutput {
    pub service: String,
    pub param: String,
}

#[derive(Debug, Default)]
pub struct AssignPlan {
    pub bindings: Vec<(Target, Value)>,
    pub missing: Vec<MissingOutput>,
}

impl AssignPlan {
    /// Record value: the value itself for one target, an array otherwise
    pub fn record_value(&self) -> Value {
        match self.bindings.as_slice() {
            [(_, v)] => v.clone(),
            many => Value::Array(many.iter().map(|(_, v)| v.clone()).collect()),
        }
    }
}

/// Evaluate the right-hand side and resolve every target
pub fn plan(
    ev: &mut Evaluator<'_>,
    targets: &[Expr],
    op: AssignOp,
    values: &[Expr],
    strict_outputs: bool,
) -> EvalResult<AssignPlan> {
    let mut plan = AssignPlan::default();

    let rhs = if targets.len() == values.len() {
        values
            .iter()
            .map(|v| ev.eval(v))
            .collect::<EvalResult<Vec<_>>>()?
    } else if let Some((call, outputs)) = web_decomposition(ev, targets, values) {
        let response = ev.call(call)?;
        let declared: Vec<String> = outputs.iter().flatten().cloned().collect();
        let mut found = web::extract_outputs(&response, &declared).into_iter();
        let mut rhs = Vec::with_capacity(targets.len());
        for (i, output) in outputs.into_iter().enumerate() {
            let value = match &output {
                Some(_) => found.next().flatten(),
                None => None,
            };
            match value {
                Some(v) => rhs.push(v),
                None => {
                    // targets past the declared outputs have no name to look up
                    let param = output.unwrap_or_else(|| format!("#{}", i + 1));
                    if strict_outputs {
                        return Err(RuntimeError::MissingOutputParameter {
                            service: call.name.clone(),
                            param,
                        }
                        .into());
                    }
                    plan.missing.push(MissingOutput {
                        service: call.name.clone(),
                        param,
                    });
                    rhs.push(Value::str(""));
                }
            }
        }
        rhs
    } else {
        return Err(RuntimeError::AssignmentMismatch {
            targets: targets.len(),
            values: values.len(),
        }
        .into());
    };

    for (target, value) in targets.iter().zip(rhs) {
        let target = resolve_target(ev, target)?;
        let value = match op.binary() {
            Some(bin) => binary_op(bin, &read_target(ev.scope(), &target)?, &value)?,
            None => value,
        };
        plan.bindings.push((target, value));
    }

    Ok(plan)
}

/// `a, b = Service(...)` where `Service` is a declared web service
///
/// Yields the output name bound to each target, `None` for targets beyond
/// the declared outputs.
fn web_decomposition<'e>(
    ev: &Evaluator<'_>,
    targets: &[Expr],
    values: &'e [Expr],
) -> Option<(&'e super::types::ProcedureCall, Vec<Option<String>>)> {
    let [Expr::ProcedureCall(call)] = values else {
        return None;
    };
    if targets.len() < 2 {
        return None;
    }
    let signature = ev.scope().web_signature(&call.name)?;
    let outputs = (0..targets.len())
        .map(|i| signature.outputs.get(i).cloned())
        .collect();
    Some((call, outputs))
}

/// Turn a target expression into a variable name plus access keys
pub fn resolve_target(ev: &mut Evaluator<'_>, expr: &Expr) -> EvalResult<Target> {
    match expr {
        Expr::Var { name, .. } => Ok(Target::Var(name.clone())),
        Expr::Struct { object, attr, .. } => {
            let (root, mut keys) = into_path(resolve_target(ev, object)?);
            keys.push(Key::Field(attr.name.clone()));
            Ok(Target::Path { root, keys })
        }
        Expr::Array { object, index, .. } => {
            let (root, mut keys) = into_path(resolve_target(ev, object)?);
            let key = match ev.eval(index)? {
                Value::Str(s) => Key::Field(s),
                other => Key::Index(index_value(&other)?),
            };
            keys.push(key);
            Ok(Target::Path { root, keys })
        }
        other => Err(RuntimeError::type_error(format!(
            "Invalid assignment target on line {}",
            other.line()
        ))
        .into()),
    }
}

fn into_path(target: Target) -> (String, Vec<Key>) {
    match target {
        Target::Var(root) => (root, Vec::new()),
        Target::Path { root, keys } => (root, keys),
    }
}

/// Current value at a target, for compound operators
pub fn read_target(scope: &Scope, target: &Target) -> Result<Value, RuntimeError> {
    match target {
        Target::Var(name) => Ok(scope.get(name)?.clone()),
        Target::Path { root, keys } => {
            let mut current = scope.get(root)?.clone();
            for key in keys {
                current = match key {
                    Key::Field(name) => get_field(&current, name)?,
                    Key::Index(i) => get_index(&current, &Value::Num(*i as f64))?,
                };
            }
            Ok(current)
        }
    }
}

/* ===================== Binding ===================== */

/// Write planned values into the scope
pub fn bind(scope: &mut Scope, bindings: Vec<(Target, Value)>) -> Result<(), RuntimeError> {
    for (target, value) in bindings {
        match target {
            Target::Var(name) => scope.set(&name, value)?,
            Target::Path { root, keys } => {
                if !scope.contains(&root) {
                    scope.set(&root, empty_container(keys.first()))?;
                }
                let slot = scope.get_mut_for_update(&root)?;
                set_path(slot, &keys, value)?;
            }
        }
    }
    Ok(())
}

/// Fresh composite for a key: struct for fields, array for indices
fn empty_container(key: Option<&Key>) -> Value {
    match key {
        Some(Key::Index(_)) => Value::Array(Vec::new()),
        _ => Value::Struct(Default::default()),
    }
}

fn set_path(slot: &mut Value, keys: &[Key], value: Value) -> Result<(), RuntimeError> {
    let Some((key, rest)) = keys.split_first() else {
        *slot = value;
        return Ok(());
    };

    if matches!(slot, Value::Null) {
        *slot = empty_container(Some(key));
    }

    match (slot, key) {
        (Value::Struct(fields), Key::Field(name)) => {
            if rest.is_empty() {
                fields.insert(name.clone(), value);
                return Ok(());
            }
            let child = fields
                .entry(name.clone())
                .or_insert_with(|| empty_container(rest.first()));
            set_path(child, rest, value)
        }
        (Value::Array(items), Key::Index(i)) => {
            let len = items.len();
            let idx = usize::try_from(*i)
                .ok()
                .filter(|u| *u <= len)
                .ok_or(RuntimeError::IndexOutOfRange { index: *i, len })?;
            if idx == len {
                items.push(empty_container(rest.first()));
            }
            set_path(&mut items[idx], rest, value)
        }
        (other, Key::Field(name)) => Err(RuntimeError::type_error(format!(
            "Cannot set property '{}' on {} value",
            name,
            other.type_name()
        ))),
        (other, Key::Index(_)) => Err(RuntimeError::type_error(format!(
            "Cannot index into {} value",
            other.type_name()
        ))),
    }
}
