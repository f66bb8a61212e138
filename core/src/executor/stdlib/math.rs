//! Math built-ins

use super::{expect_args, num_arg};
use crate::executor::errors::RuntimeError;
use crate::executor::types::Value;

pub fn abs(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("abs", args, 1)?;
    Ok(Value::Num(num_arg("abs", &args[0])?.abs()))
}

/// round(x) or round(x, digits)
pub fn round(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [x] => Ok(Value::Num(num_arg("round", x)?.round())),
        [x, digits] => {
            let factor = 10f64.powi(num_arg("round", digits)? as i32);
            Ok(Value::Num((num_arg("round", x)? * factor).round() / factor))
        }
        _ => Err(RuntimeError::WrongArgCount {
            function: "round".to_string(),
            expected: 1,
            got: args.len(),
        }),
    }
}

pub fn floor(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("floor", args, 1)?;
    Ok(Value::Num(num_arg("floor", &args[0])?.floor()))
}

pub fn ceil(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("ceil", args, 1)?;
    Ok(Value::Num(num_arg("ceil", &args[0])?.ceil()))
}

pub fn min(args: &[Value]) -> Result<Value, RuntimeError> {
    fold("min", args, f64::min)
}

pub fn max(args: &[Value]) -> Result<Value, RuntimeError> {
    fold("max", args, f64::max)
}

/// Accepts either several numbers or a single array of numbers
fn fold(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    let items = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };
    let Some((first, rest)) = items.split_first() else {
        return Err(RuntimeError::WrongArgCount {
            function: name.to_string(),
            expected: 1,
            got: 0,
        });
    };
    let mut acc = num_arg(name, first)?;
    for v in rest {
        acc = f(acc, num_arg(name, v)?);
    }
    Ok(Value::Num(acc))
}
