//! Built-in function implementations
//!
//! Functions are organized by category; `StdlibFunc` names each one and
//! `call_stdlib_func` dispatches to it.

pub mod collection;
pub mod convert;
pub mod math;
pub mod text;

use super::errors::RuntimeError;
use super::types::Value;

/* ===================== Standard Library Function Types ===================== */

/// Built-in function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdlibFunc {
    Len,
    Str,
    Int,
    Float,
    Upper,
    Lower,
    Trim,
    Contains,
    Split,
    Join,
    Replace,
    Substr,
    Append,
    Keys,
    Now,
    JsonParse,
    JsonStringify,
    Abs,
    Round,
    Floor,
    Ceil,
    Min,
    Max,
}

impl StdlibFunc {
    /// Resolve a script-level name
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "len" => StdlibFunc::Len,
            "str" => StdlibFunc::Str,
            "int" => StdlibFunc::Int,
            "float" => StdlibFunc::Float,
            "upper" => StdlibFunc::Upper,
            "lower" => StdlibFunc::Lower,
            "trim" => StdlibFunc::Trim,
            "contains" => StdlibFunc::Contains,
            "split" => StdlibFunc::Split,
            "join" => StdlibFunc::Join,
            "replace" => StdlibFunc::Replace,
            "substr" => StdlibFunc::Substr,
            "append" => StdlibFunc::Append,
            "keys" => StdlibFunc::Keys,
            "now" => StdlibFunc::Now,
            "json_parse" => StdlibFunc::JsonParse,
            "json_stringify" => StdlibFunc::JsonStringify,
            "abs" => StdlibFunc::Abs,
            "round" => StdlibFunc::Round,
            "floor" => StdlibFunc::Floor,
            "ceil" => StdlibFunc::Ceil,
            "min" => StdlibFunc::Min,
            "max" => StdlibFunc::Max,
            _ => return None,
        };
        Some(func)
    }
}

/* ===================== Stdlib Dispatcher ===================== */

/// Call a built-in function with evaluated arguments
pub fn call_stdlib_func(func: StdlibFunc, args: &[Value]) -> Result<Value, RuntimeError> {
    match func {
        StdlibFunc::Len => collection::len(args),
        StdlibFunc::Append => collection::append(args),
        StdlibFunc::Keys => collection::keys(args),
        StdlibFunc::Contains => collection::contains(args),
        StdlibFunc::Join => collection::join(args),
        StdlibFunc::Split => text::split(args),
        StdlibFunc::Upper => text::upper(args),
        StdlibFunc::Lower => text::lower(args),
        StdlibFunc::Trim => text::trim(args),
        StdlibFunc::Replace => text::replace(args),
        StdlibFunc::Substr => text::substr(args),
        StdlibFunc::Str => convert::to_str(args),
        StdlibFunc::Int => convert::to_int(args),
        StdlibFunc::Float => convert::to_float(args),
        StdlibFunc::Now => convert::now(args),
        StdlibFunc::JsonParse => convert::json_parse(args),
        StdlibFunc::JsonStringify => convert::json_stringify(args),
        StdlibFunc::Abs => math::abs(args),
        StdlibFunc::Round => math::round(args),
        StdlibFunc::Floor => math::floor(args),
        StdlibFunc::Ceil => math::ceil(args),
        StdlibFunc::Min => math::min(args),
        StdlibFunc::Max => math::max(args),
    }
}

/* ===================== Argument Helpers ===================== */

pub(crate) fn expect_args(
    name: &str,
    args: &[Value],
    expected: usize,
) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::WrongArgCount {
            function: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

pub(crate) fn num_arg(name: &str, v: &Value) -> Result<f64, RuntimeError> {
    v.as_num().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "{} expects a number, got {}",
            name,
            v.type_name()
        ))
    })
}

pub(crate) fn str_arg<'a>(name: &str, v: &'a Value) -> Result<&'a str, RuntimeError> {
    v.as_str().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "{} expects a string, got {}",
            name,
            v.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_is_not_builtin() {
        assert_eq!(StdlibFunc::from_name("len"), Some(StdlibFunc::Len));
        assert_eq!(StdlibFunc::from_name("GetOrder"), None);
    }

    #[test]
    fn test_wrong_arg_count() {
        let err = call_stdlib_func(StdlibFunc::Upper, &[]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::WrongArgCount {
                function: "upper".to_string(),
                expected: 1,
                got: 0
            }
        );
    }
}
