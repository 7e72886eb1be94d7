//! Built-in tools
//!
//! Every built-in shares the same [`Sandbox`](crate::sandbox::Sandbox)
//! instance and re-checks its own parameters on entry; the registry's
//! schema validation only covers declared fields.

pub mod bash;
pub mod exec;
pub mod grep;
pub mod http;
pub mod read;
pub mod replace;
pub mod write;

pub use bash::BashTool;
pub use exec::ExecCommandTool;
pub use grep::GrepTool;
pub use http::HttpRequestTool;
pub use read::ReadFileTool;
pub use replace::SearchReplaceTool;
pub use write::WriteFileTool;

use anvil_foundation::{Error, Result};
use serde_json::{Map, Value};

/// Required string parameter
pub(crate) fn require_str<'a>(input: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    match input.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::invalid_input(
            field,
            format!("{field} must be a string, got {}", json_type(other)),
        )),
        None => Err(Error::invalid_input(field, format!("{field} is required"))),
    }
}

/// Optional string parameter; errors only on a wrong type
pub(crate) fn opt_str<'a>(
    input: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>> {
    match input.get(field) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::invalid_input(
            field,
            format!("{field} must be a string, got {}", json_type(other)),
        )),
        None => Ok(None),
    }
}

/// Optional boolean parameter with a default
pub(crate) fn opt_bool(input: &Map<String, Value>, field: &str, default: bool) -> Result<bool> {
    match input.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(Error::invalid_input(
            field,
            format!("{field} must be a boolean, got {}", json_type(other)),
        )),
        None => Ok(default),
    }
}

/// Optional integer parameter with a default.
///
/// Accepts a float with zero fractional part, matching the validator.
pub(crate) fn opt_int(input: &Map<String, Value>, field: &str, default: i64) -> Result<i64> {
    match input.get(field) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 {
                    Ok(f as i64)
                } else {
                    Err(Error::invalid_input(
                        field,
                        format!("{field} must be an integer, got float {f}"),
                    ))
                }
            } else {
                Err(Error::invalid_input(field, format!("{field} is out of range")))
            }
        }
        Some(other) => Err(Error::invalid_input(
            field,
            format!("{field} must be an integer, got {}", json_type(other)),
        )),
        None => Ok(default),
    }
}

/// Optional string-to-string map parameter
pub(crate) fn opt_string_map(
    input: &Map<String, Value>,
    field: &str,
) -> Result<Vec<(String, String)>> {
    match input.get(field) {
        Some(Value::Object(map)) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                match value {
                    Value::String(s) => pairs.push((key.clone(), s.clone())),
                    other => {
                        return Err(Error::invalid_input(
                            field,
                            format!(
                                "'{key}' must have a string value, got {}",
                                json_type(other)
                            ),
                        ));
                    }
                }
            }
            Ok(pairs)
        }
        Some(other) => Err(Error::invalid_input(
            field,
            format!("{field} must be an object, got {}", json_type(other)),
        )),
        None => Ok(Vec::new()),
    }
}

/// Integer parameter constrained to an inclusive range
pub(crate) fn opt_int_in_range(
    input: &Map<String, Value>,
    field: &str,
    default: i64,
    min: i64,
    max: i64,
) -> Result<i64> {
    let value = opt_int(input, field, default)?;
    if value < min || value > max {
        return Err(Error::invalid_input(
            field,
            format!("{field} must be between {min} and {max}"),
        ));
    }
    Ok(value)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
