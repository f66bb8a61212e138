//! Conversion, JSON and clock built-ins

use super::{expect_args, str_arg};
use crate::executor::errors::RuntimeError;
use crate::executor::types::Value;

pub fn to_str(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("str", args, 1)?;
    Ok(Value::Str(args[0].to_string()))
}

pub fn to_int(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("int", args, 1)?;
    cast_int(&args[0])
}

pub fn to_float(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("float", args, 1)?;
    cast_float(&args[0])
}

/// Truncating integer conversion shared with the `(int)` cast
pub fn cast_int(v: &Value) -> Result<Value, RuntimeError> {
    match cast_float(v)? {
        Value::Num(n) => Ok(Value::Num(n.trunc())),
        other => Ok(other),
    }
}

/// Numeric conversion shared with the `(float)` cast
pub fn cast_float(v: &Value) -> Result<Value, RuntimeError> {
    match v {
        Value::Num(n) => Ok(Value::Num(*n)),
        Value::Bool(b) => Ok(Value::Num(if *b { 1.0 } else { 0.0 })),
        Value::Null => Ok(Value::Num(0.0)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Num).map_err(|_| {
            RuntimeError::type_error(format!("Cannot convert '{}' to a number", s))
        }),
        other => Err(RuntimeError::type_error(format!(
            "Cannot convert {} to a number",
            other.type_name()
        ))),
    }
}

/// Current UTC time, RFC 3339
pub fn now(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("now", args, 0)?;
    Ok(Value::Str(chrono::Utc::now().to_rfc3339()))
}

pub fn json_parse(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("json_parse", args, 1)?;
    let text = str_arg("json_parse", &args[0])?;
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| RuntimeError::type_error(format!("Invalid JSON: {}", e)))?;
    Ok(Value::from_json(&json))
}

pub fn json_stringify(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("json_stringify", args, 1)?;
    Ok(Value::Str(args[0].to_json().to_string()))
}
