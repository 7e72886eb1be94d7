//! Input validation against tool schemas
//!
//! The validator checks a raw input map against a [`ToolSchema`] before a
//! tool runs. Checks are structural and permissive: fields not declared in
//! the schema pass untouched, and the first failing check short-circuits.

use crate::schema::{PropertyDef, ToolSchema};
use anvil_foundation::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value};

/// Validates tool input maps against schemas
#[derive(Debug, Default, Clone)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `input` against `schema`.
    ///
    /// Returns the first violation as [`Error::InvalidInput`] naming the
    /// offending field; the tool name is attached later by the registry.
    pub fn validate(&self, schema: &ToolSchema, input: &Map<String, Value>) -> Result<()> {
        if schema.schema_type != "object" {
            return Err(Error::invalid_input(
                "schema",
                format!("schema type must be 'object', got '{}'", schema.schema_type),
            ));
        }

        for required in &schema.required {
            if !input.contains_key(required) {
                return Err(Error::invalid_input(required, "required field is missing"));
            }
        }

        for (name, value) in input {
            // Unknown fields are allowed (permissive mode); only declared
            // fields are checked.
            if let Some(def) = schema.properties.get(name) {
                self.validate_property(name, value, def)?;
            }
        }

        Ok(())
    }

    fn validate_property(&self, name: &str, value: &Value, def: &PropertyDef) -> Result<()> {
        self.validate_type(name, value, &def.prop_type)?;

        if def.prop_type == "string" {
            // Type check above guarantees this is a string.
            let s = value.as_str().unwrap_or_default();

            if !def.enum_values.is_empty() && !def.enum_values.iter().any(|v| v == s) {
                return Err(Error::invalid_input(
                    name,
                    format!(
                        "value '{}' is not in allowed enum values: [{}]",
                        s,
                        def.enum_values.join(", ")
                    ),
                ));
            }

            if let Some(min) = def.min_length {
                if s.len() < min {
                    return Err(Error::invalid_input(
                        name,
                        format!("string length {} is less than minimum {}", s.len(), min),
                    ));
                }
            }

            if let Some(max) = def.max_length {
                if s.len() > max {
                    return Err(Error::invalid_input(
                        name,
                        format!("string length {} exceeds maximum {}", s.len(), max),
                    ));
                }
            }

            if let Some(pattern) = &def.pattern {
                // A broken pattern in the schema is reported as an input
                // error, never a panic.
                let re = Regex::new(pattern).map_err(|e| {
                    Error::invalid_input(name, format!("invalid regex pattern '{pattern}': {e}"))
                })?;
                if !re.is_match(s) {
                    return Err(Error::invalid_input(
                        name,
                        format!("value '{s}' does not match pattern '{pattern}'"),
                    ));
                }
            }
        }

        Ok(())
    }

    fn validate_type(&self, name: &str, value: &Value, expected: &str) -> Result<()> {
        let ok = match expected {
            "string" => value.is_string(),
            "number" => value.is_number(),
            // JSON decoders may represent every number as a float; accept a
            // float for an integer field only when it has no fractional part.
            "integer" => match value {
                Value::Number(n) => {
                    if n.is_i64() || n.is_u64() {
                        true
                    } else if let Some(f) = n.as_f64() {
                        if f.fract() != 0.0 {
                            return Err(Error::invalid_input(
                                name,
                                format!("expected integer, got float with fractional part: {f}"),
                            ));
                        }
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            },
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            other => {
                return Err(Error::invalid_input(
                    name,
                    format!("unsupported type in schema: {other}"),
                ));
            }
        };

        if !ok {
            return Err(Error::invalid_input(
                name,
                format!("expected type {expected}, got {}", type_name(value)),
            ));
        }

        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
