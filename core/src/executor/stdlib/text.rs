//! String built-ins

use super::{expect_args, num_arg, str_arg};
use crate::executor::errors::RuntimeError;
use crate::executor::types::Value;

pub fn upper(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("upper", args, 1)?;
    Ok(Value::Str(str_arg("upper", &args[0])?.to_uppercase()))
}

pub fn lower(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("lower", args, 1)?;
    Ok(Value::Str(str_arg("lower", &args[0])?.to_lowercase()))
}

pub fn trim(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("trim", args, 1)?;
    Ok(Value::str(str_arg("trim", &args[0])?.trim()))
}

/// split(text, separator) -> array of strings
pub fn split(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("split", args, 2)?;
    let text = str_arg("split", &args[0])?;
    let sep = str_arg("split", &args[1])?;
    let parts = if sep.is_empty() {
        text.chars().map(|c| Value::Str(c.to_string())).collect()
    } else {
        text.split(sep).map(Value::str).collect()
    };
    Ok(Value::Array(parts))
}

pub fn replace(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("replace", args, 3)?;
    let text = str_arg("replace", &args[0])?;
    let from = str_arg("replace", &args[1])?;
    let to = str_arg("replace", &args[2])?;
    Ok(Value::Str(text.replace(from, to)))
}

/// substr(text, start[, length]), counted in characters
pub fn substr(args: &[Value]) -> Result<Value, RuntimeError> {
    let (text, start, len) = match args {
        [t, s] => (str_arg("substr", t)?, num_arg("substr", s)?, None),
        [t, s, l] => (
            str_arg("substr", t)?,
            num_arg("substr", s)?,
            Some(num_arg("substr", l)?),
        ),
        _ => {
            return Err(RuntimeError::WrongArgCount {
                function: "substr".to_string(),
                expected: 2,
                got: args.len(),
            })
        }
    };

    let start = start.max(0.0) as usize;
    let chars = text.chars().skip(start);
    let out: String = match len {
        Some(l) => chars.take(l.max(0.0) as usize).collect(),
        None => chars.collect(),
    };
    Ok(Value::Str(out))
}
