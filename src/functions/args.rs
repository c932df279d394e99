//! Typed access to step arguments
//!
//! Arguments come from model output, so every accessor checks the JSON type
//! and reports the offending argument by name.

use crate::core::error::{QueryError, Result};
use crate::plan::Args;
use serde_json::Value;

pub fn required_str<'a>(args: &'a Args, name: &str) -> Result<&'a str> {
    optional_str(args, name)?.ok_or_else(|| QueryError::invalid_argument(name, "missing"))
}

/// Null and absent are both treated as "not given"
pub fn optional_str<'a>(args: &'a Args, name: &str) -> Result<Option<&'a str>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(QueryError::invalid_argument(
            name,
            format!("expected a string, got {}", other),
        )),
    }
}

/// A number, or a string holding one
pub fn required_number(args: &Args, name: &str) -> Result<f64> {
    match args.get(name) {
        None | Some(Value::Null) => Err(QueryError::invalid_argument(name, "missing")),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| QueryError::invalid_argument(name, "number out of range")),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| {
            QueryError::invalid_argument(name, format!("expected a number, got '{}'", s))
        }),
        Some(other) => Err(QueryError::invalid_argument(
            name,
            format!("expected a number, got {}", other),
        )),
    }
}

pub fn optional_usize(args: &Args, name: &str) -> Result<Option<usize>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or_else(|| QueryError::invalid_argument(name, "expected a non-negative integer")),
        Some(other) => Err(QueryError::invalid_argument(
            name,
            format!("expected a non-negative integer, got {}", other),
        )),
    }
}

/// A list of strings; a bare string is accepted as a one-element list
pub fn optional_str_list(args: &Args, name: &str) -> Result<Option<Vec<String>>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(QueryError::invalid_argument(
                    name,
                    format!("expected strings, got {}", other),
                )),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(other) => Err(QueryError::invalid_argument(
            name,
            format!("expected a list of strings, got {}", other),
        )),
    }
}
