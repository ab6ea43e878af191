use std::sync::Arc;

use jsonschema::Validator;
use serde_json::{json, Value};

use crate::config::ParserKind;
use crate::descriptor::ParseFn;
use crate::error::{Result, SchemaError};

/// Compile a declarative parser into a parse function.
///
/// `field` only labels compile errors.
pub fn build(field: &str, kind: &ParserKind) -> Result<ParseFn> {
    let parser: ParseFn = match kind.clone() {
        ParserKind::Float { min, max } => {
            check_bounds(field, min, max)?;
            Arc::new(move |raw: &str| parse_float(raw, min, max))
        }
        ParserKind::Integer { min, max } => {
            check_bounds(field, min, max)?;
            Arc::new(move |raw: &str| parse_integer(raw, min, max))
        }
        ParserKind::Bool => Arc::new(parse_bool),
        ParserKind::Text { max_length } => Arc::new(move |raw: &str| parse_text(raw, max_length)),
        ParserKind::Hex { bytes } => Arc::new(move |raw: &str| parse_hex(raw, bytes)),
        ParserKind::Enum { values } => {
            if values.is_empty() {
                return Err(SchemaError::InvalidField {
                    field: field.to_string(),
                    message: "enum parser needs at least one value".to_string(),
                });
            }
            Arc::new(move |raw: &str| parse_enum(raw, &values))
        }
        ParserKind::Json { schema } => {
            let validator = match schema {
                Some(schema) => Some(Arc::new(jsonschema::validator_for(&schema).map_err(
                    |err| SchemaError::CompileFailed {
                        field: field.to_string(),
                        message: err.to_string(),
                    },
                )?)),
                None => None,
            };
            Arc::new(move |raw: &str| parse_json(raw, validator.as_deref()))
        }
    };
    Ok(parser)
}

fn check_bounds<T: PartialOrd>(field: &str, min: Option<T>, max: Option<T>) -> Result<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(SchemaError::InvalidField {
            field: field.to_string(),
            message: "min is greater than max".to_string(),
        }),
        _ => Ok(()),
    }
}

fn parse_float(raw: &str, min: Option<f64>, max: Option<f64>) -> std::result::Result<Value, String> {
    let value: f64 = raw.parse().map_err(|_| "not a number".to_string())?;
    if !value.is_finite() {
        return Err("not a finite number".to_string());
    }
    if min.is_some_and(|min| value < min) || max.is_some_and(|max| value > max) {
        return Err(format!("{value} out of range"));
    }
    Ok(json!(value))
}

fn parse_integer(raw: &str, min: Option<i64>, max: Option<i64>) -> std::result::Result<Value, String> {
    let value: i64 = raw.parse().map_err(|_| "not an integer".to_string())?;
    if min.is_some_and(|min| value < min) || max.is_some_and(|max| value > max) {
        return Err(format!("{value} out of range"));
    }
    Ok(json!(value))
}

fn parse_bool(raw: &str) -> std::result::Result<Value, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(Value::Bool(true)),
        "0" | "false" | "off" => Ok(Value::Bool(false)),
        _ => Err("not a boolean".to_string()),
    }
}

fn parse_text(raw: &str, max_length: Option<usize>) -> std::result::Result<Value, String> {
    if let Some(max) = max_length {
        let len = raw.chars().count();
        if len > max {
            return Err(format!("{len} characters exceeds {max}"));
        }
    }
    Ok(Value::String(raw.to_string()))
}

fn parse_hex(raw: &str, bytes: Option<usize>) -> std::result::Result<Value, String> {
    if raw.is_empty() || raw.len() % 2 != 0 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("not an even-length hex string".to_string());
    }
    if let Some(expected) = bytes {
        if raw.len() / 2 != expected {
            return Err(format!("expected {expected} bytes"));
        }
    }
    Ok(Value::String(raw.to_ascii_uppercase()))
}

fn parse_enum(raw: &str, values: &[String]) -> std::result::Result<Value, String> {
    if values.iter().any(|v| v == raw) {
        Ok(Value::String(raw.to_string()))
    } else {
        Err(format!("expected one of {}", values.join(", ")))
    }
}

fn parse_json(raw: &str, validator: Option<&Validator>) -> std::result::Result<Value, String> {
    let value: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    let Some(validator) = validator else {
        return Ok(value);
    };

    let rejected = {
        let mut errors = validator.iter_errors(&value);
        errors.next().map(|first| {
            let mut message = first.to_string();
            for err in errors.take(3) {
                message.push_str("; ");
                message.push_str(&err.to_string());
            }
            message
        })
    };
    match rejected {
        Some(message) => Err(message),
        None => Ok(value),
    }
}
