use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::semantic_type::SemanticType;

/// A single coerced cell value. `Null` only ever arises from an
/// `Optional<T>` field whose raw value was absent or blank.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Decimal(Decimal),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Null,
}

impl Value {
    /// Canonical string form used by `etl_row_hash` - every variant renders
    /// the same way it would in the source file, so the hash is stable
    /// across readers. `Null` renders as the empty string, matching the
    /// original's `str(v) if v is not None else ""`.
    pub fn canonical_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
            Value::Date(d) => d.to_string(),
            Value::Datetime(dt) => dt.to_string(),
            Value::Null => String::new(),
        }
    }
}

/// Coerces a raw string cell into a `Value` per `semantic_type`.
///
/// An empty or whitespace-only raw value against an `Optional<T>` type
/// yields `Value::Null`; against a required type it is a coercion failure,
/// surfaced by the caller as an `intake::FieldError` (never as a raised
/// `EtlError` - row-level failures are diverted to the DLQ, not raised).
pub fn coerce(raw: &str, semantic_type: &SemanticType) -> Result<Value, String> {
    if semantic_type.is_optional() && raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    match semantic_type.inner() {
        SemanticType::String => Ok(Value::String(raw.to_string())),
        SemanticType::Int => raw.trim().parse::<i64>().map(Value::Int).map_err(|e| e.to_string()),
        SemanticType::Decimal => Decimal::from_str(raw.trim()).map(Value::Decimal).map_err(|e| e.to_string()),
        SemanticType::Float => raw.trim().parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
        SemanticType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "y" => Ok(Value::Bool(true)),
            "0" | "false" | "f" | "no" | "n" => Ok(Value::Bool(false)),
            other => Err(format!("'{other}' is not a recognised boolean")),
        },
        SemanticType::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| e.to_string()),
        SemanticType::Datetime => NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
            .map(Value::Datetime)
            .map_err(|e| e.to_string()),
        SemanticType::Optional(_) => unreachable!("inner() strips exactly one layer of Optional"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_coerces_to_null() {
        let v = coerce("  ", &SemanticType::optional(SemanticType::Int)).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn blank_required_fails() {
        assert!(coerce("", &SemanticType::Int).is_err());
    }

    #[test]
    fn bool_accepts_original_style_1_0() {
        assert_eq!(coerce("1", &SemanticType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(coerce("0", &SemanticType::Bool).unwrap(), Value::Bool(false));
    }

    #[test]
    fn canonical_string_renders_null_as_empty() {
        assert_eq!(Value::Null.canonical_string(), "");
    }
}
