//! Caller-supplied key values and their conversion to key field kinds.

use crate::entity::FieldDef;
use crate::error::DataError;
use crate::value::{ScalarKind, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A primary-key value as supplied by a caller.
///
/// Validated against the key field's declared kind when a predicate is
/// built, never silently widened or narrowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Int(i64),
    Text(String),
    Uuid(Uuid),
    /// Values for a composite key, in key-field order.
    Composite(Vec<KeyValue>),
}

impl KeyValue {
    /// Read a key from a type-erased JSON value (e.g. a path or body parameter).
    pub fn from_json(value: serde_json::Value) -> Result<Self, DataError> {
        Self::from_json_inner(value, true)
    }

    fn from_json_inner(value: serde_json::Value, allow_composite: bool) -> Result<Self, DataError> {
        match value {
            serde_json::Value::Null => Err(DataError::NullKey),
            serde_json::Value::Number(n) => n.as_i64().map(KeyValue::Int).ok_or_else(|| {
                DataError::KeyConversion {
                    entity: String::new(),
                    field: String::new(),
                    expected: ScalarKind::Int,
                    found: format!("number {n}"),
                }
            }),
            serde_json::Value::String(s) => Ok(KeyValue::Text(s)),
            serde_json::Value::Array(items) if allow_composite => items
                .into_iter()
                .map(|item| Self::from_json_inner(item, false))
                .collect::<Result<Vec<_>, _>>()
                .map(KeyValue::Composite),
            other => Err(DataError::KeyConversion {
                entity: String::new(),
                field: String::new(),
                expected: ScalarKind::Int,
                found: json_type_name(&other).to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        match self {
            KeyValue::Int(v) => format!("int {v}"),
            KeyValue::Text(v) => format!("text '{v}'"),
            KeyValue::Uuid(v) => format!("uuid {v}"),
            KeyValue::Composite(parts) => format!("composite key of {} values", parts.len()),
        }
    }

    /// Convert a scalar key to the declared kind of `field`.
    ///
    /// Conversions are locale independent: numbers are parsed and printed in
    /// their plain decimal form and timestamps use RFC 3339.
    pub fn convert_to(&self, entity: &str, field: &FieldDef) -> Result<Value, DataError> {
        let converted = match (self, field.kind) {
            (KeyValue::Int(v), ScalarKind::Int) => Some(Value::Int(*v)),
            (KeyValue::Int(v), ScalarKind::Float) => exact_f64(*v).map(Value::Float),
            (KeyValue::Int(v), ScalarKind::Text) => Some(Value::Text(v.to_string())),
            (KeyValue::Text(s), ScalarKind::Text) => Some(Value::Text(s.clone())),
            (KeyValue::Text(s), ScalarKind::Int) => s.parse::<i64>().ok().map(Value::Int),
            (KeyValue::Text(s), ScalarKind::Float) => s
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            (KeyValue::Text(s), ScalarKind::Uuid) => Uuid::parse_str(s).ok().map(Value::Uuid),
            (KeyValue::Text(s), ScalarKind::Timestamp) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc))),
            (KeyValue::Text(s), ScalarKind::Bool) => s.parse::<bool>().ok().map(Value::Bool),
            (KeyValue::Uuid(u), ScalarKind::Uuid) => Some(Value::Uuid(*u)),
            (KeyValue::Uuid(u), ScalarKind::Text) => Some(Value::Text(u.to_string())),
            _ => None,
        };
        converted.ok_or_else(|| DataError::KeyConversion {
            entity: entity.to_string(),
            field: field.name.to_string(),
            expected: field.kind,
            found: self.describe(),
        })
    }
}

/// `v` as a float, or `None` when the float cannot hold it exactly.
fn exact_f64(v: i64) -> Option<f64> {
    let f = v as f64;
    (f as i128 == i128::from(v)).then_some(f)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "nested array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(i64::from(v))
    }
}

impl From<u32> for KeyValue {
    fn from(v: u32) -> Self {
        KeyValue::Int(i64::from(v))
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

impl From<Uuid> for KeyValue {
    fn from(v: Uuid) -> Self {
        KeyValue::Uuid(v)
    }
}

impl From<Vec<KeyValue>> for KeyValue {
    fn from(v: Vec<KeyValue>) -> Self {
        KeyValue::Composite(v)
    }
}
