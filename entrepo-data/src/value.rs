//! Scalar values exchanged between entities, predicates and stores.

use crate::error::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// The declared type of a scalar entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Text,
    Uuid,
    Timestamp,
    Bytes,
}

impl ScalarKind {
    /// Whether values of this kind have a natural total order.
    pub fn is_sortable(self) -> bool {
        !matches!(self, ScalarKind::Bytes)
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Text => "text",
            ScalarKind::Uuid => "uuid",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A single scalar field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl Value {
    /// The kind of this value, `None` for `Null`.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ScalarKind::Bool),
            Value::Int(_) => Some(ScalarKind::Int),
            Value::Float(_) => Some(ScalarKind::Float),
            Value::Text(_) => Some(ScalarKind::Text),
            Value::Uuid(_) => Some(ScalarKind::Uuid),
            Value::Timestamp(_) => Some(ScalarKind::Timestamp),
            Value::Bytes(_) => Some(ScalarKind::Bytes),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "bytes",
        }
    }

    /// `None` for `Null`, the value otherwise. Used by setters of nullable fields.
    pub fn into_option(self) -> Option<Value> {
        match self {
            Value::Null => None,
            other => Some(other),
        }
    }

    /// Natural order between two values of the same kind.
    ///
    /// `Null` sorts before every non-null value. Returns `None` for mismatched
    /// kinds and for `Bytes`, which has no natural order.
    pub fn natural_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident, $kind:ident);* $(;)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = DataError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(DataError::TypeMismatch {
                            expected: ScalarKind::$kind,
                            found: other.type_name(),
                        }),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool, Bool;
    i64 => Int, Int;
    f64 => Float, Float;
    String => Text, Text;
    Uuid => Uuid, Uuid;
    DateTime<Utc> => Timestamp, Timestamp;
    Vec<u8> => Bytes, Bytes;
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
