//! Array, struct and membership built-ins

use super::{expect_args, str_arg};
use crate::executor::errors::RuntimeError;
use crate::executor::types::Value;

pub fn len(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("len", args, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Struct(fields) => fields.len(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "len expects a string, array or struct, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Num(n as f64))
}

/// append(array, item) -> new array
pub fn append(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("append", args, 2)?;
    match &args[0] {
        Value::Array(items) => {
            let mut items = items.clone();
            items.push(args[1].clone());
            Ok(Value::Array(items))
        }
        other => Err(RuntimeError::type_error(format!(
            "append expects an array, got {}",
            other.type_name()
        ))),
    }
}

pub fn keys(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("keys", args, 1)?;
    match &args[0] {
        Value::Struct(fields) => Ok(Value::Array(
            fields.keys().map(|k| Value::Str(k.clone())).collect(),
        )),
        other => Err(RuntimeError::type_error(format!(
            "keys expects a struct, got {}",
            other.type_name()
        ))),
    }
}

/// Substring, array element or struct field membership
pub fn contains(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("contains", args, 2)?;
    let found = match (&args[0], &args[1]) {
        (Value::Str(haystack), needle) => haystack.contains(&needle.to_string()),
        (Value::Array(items), needle) => items.contains(needle),
        (Value::Struct(fields), key) => fields.contains_key(&key.to_string()),
        (other, _) => {
            return Err(RuntimeError::type_error(format!(
                "contains expects a string, array or struct, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Bool(found))
}

/// join(array, separator)
pub fn join(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args("join", args, 2)?;
    let sep = str_arg("join", &args[1])?;
    match &args[0] {
        Value::Array(items) => Ok(Value::Str(
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(sep),
        )),
        other => Err(RuntimeError::type_error(format!(
            "join expects an array, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn test_len_of_each_composite() {
        assert_eq!(len(&[Value::str("héllo")]).unwrap(), Value::Num(5.0));
        assert_eq!(
            len(&[Value::Array(vec![Value::Null, Value::Null])]).unwrap(),
            Value::Num(2.0)
        );
        assert!(len(&[Value::Num(1.0)]).is_err());
    }

    #[test]
    fn test_contains_and_join() {
        let s = Value::Struct(btreemap! { "a".to_string() => Value::Num(1.0) });
        assert_eq!(contains(&[s, Value::str("a")]).unwrap(), Value::Bool(true));

        let arr = Value::Array(vec![Value::Num(1.0), Value::str("x")]);
        assert_eq!(
            contains(&[arr.clone(), Value::str("x")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(join(&[arr, Value::str("-")]).unwrap(), Value::str("1-x"));
    }
}
