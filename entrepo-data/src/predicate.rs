//! Declarative predicates over entity fields.
//!
//! A [`Predicate`] is plain data: stores interpret it, either by evaluating
//! it row by row ([`Predicate::evaluate`]) or by rendering it to SQL
//! (see [`crate::query::QueryBuilder`]).

use crate::entity::{EntityDescriptor, EntitySchema};
use crate::error::DataError;
use crate::key::KeyValue;
use crate::metadata::KeyResolver;
use crate::value::Value;
use std::cmp::Ordering;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// A boolean condition over an entity's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: CmpOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    IsNull(String),
    /// Compares the number of members of a collection-valued field.
    CountOf {
        collection: String,
        op: CmpOp,
        len: u64,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CmpOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CmpOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CmpOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CmpOp::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CmpOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CmpOp::Ge, value)
    }

    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::IsNull(field.into())
    }

    pub fn count_of(collection: impl Into<String>, op: CmpOp, len: u64) -> Self {
        Predicate::CountOf {
            collection: collection.into(),
            op,
            len,
        }
    }

    /// Logical AND; nested conjunctions are flattened.
    pub fn and(self, other: Predicate) -> Self {
        let mut parts = match self {
            Predicate::And(parts) => parts,
            p => vec![p],
        };
        match other {
            Predicate::And(more) => parts.extend(more),
            p => parts.push(p),
        }
        Predicate::And(parts)
    }

    pub fn or(self, other: Predicate) -> Self {
        let mut parts = match self {
            Predicate::Or(parts) => parts,
            p => vec![p],
        };
        match other {
            Predicate::Or(more) => parts.extend(more),
            p => parts.push(p),
        }
        Predicate::Or(parts)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Check field names and value kinds against `schema`.
    pub fn validate(&self, schema: &EntitySchema) -> Result<(), DataError> {
        match self {
            Predicate::Compare { field, value, .. } => check_value(schema, field, value),
            Predicate::In { field, values } => values
                .iter()
                .try_for_each(|value| check_value(schema, field, value)),
            Predicate::IsNull(field) => schema
                .field(field)
                .map(|_| ())
                .ok_or_else(|| DataError::unknown_field(schema.name(), field)),
            Predicate::CountOf { collection, .. } => schema
                .collection(collection)
                .map(|_| ())
                .ok_or_else(|| DataError::unknown_field(schema.name(), collection)),
            Predicate::And(parts) | Predicate::Or(parts) => {
                parts.iter().try_for_each(|p| p.validate(schema))
            }
            Predicate::Not(inner) => inner.validate(schema),
        }
    }

    /// Evaluate against a fully loaded entity.
    ///
    /// Comparisons involving `Null` never match; use [`Predicate::is_null`].
    pub fn evaluate<E>(&self, descriptor: &EntityDescriptor<E>, entity: &E) -> Result<bool, DataError> {
        match self {
            Predicate::Compare { field, op, value } => {
                let actual = descriptor.get(entity, field)?;
                Ok(compare_non_null(&actual, value).is_some_and(|ord| op.matches(ord)))
            }
            Predicate::In { field, values } => {
                let actual = descriptor.get(entity, field)?;
                Ok(values
                    .iter()
                    .any(|v| compare_non_null(&actual, v) == Some(Ordering::Equal)))
            }
            Predicate::IsNull(field) => Ok(descriptor.get(entity, field)?.is_null()),
            Predicate::CountOf {
                collection,
                op,
                len,
            } => {
                let members = descriptor.collection(entity, collection)?.len() as u64;
                Ok(op.matches(members.cmp(len)))
            }
            Predicate::And(parts) => {
                for part in parts {
                    if !part.evaluate(descriptor, entity)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(parts) => {
                for part in parts {
                    if part.evaluate(descriptor, entity)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(inner) => Ok(!inner.evaluate(descriptor, entity)?),
        }
    }
}

fn check_value(schema: &EntitySchema, field: &str, value: &Value) -> Result<(), DataError> {
    let def = schema
        .field(field)
        .ok_or_else(|| DataError::unknown_field(schema.name(), field))?;
    match value.kind() {
        Some(kind) if kind != def.kind => Err(DataError::InvalidPredicate(format!(
            "field '{}.{}' is {}, compared with {}",
            schema.name(),
            field,
            def.kind,
            kind
        ))),
        _ => Ok(()),
    }
}

fn compare_non_null(actual: &Value, expected: &Value) -> Option<Ordering> {
    if actual.is_null() || expected.is_null() {
        return None;
    }
    match (actual, expected) {
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        _ => actual.natural_cmp(expected),
    }
}

/// Build `key field == key` for `entity`.
///
/// A scalar key targets the first key field; a composite key is matched
/// positionally against every key field and yields a conjunction. `None`
/// fails with [`DataError::NullKey`] before any conversion is attempted.
pub fn key_equals(
    resolver: &KeyResolver,
    entity: &str,
    key: Option<&KeyValue>,
) -> Result<Predicate, DataError> {
    let key = key.ok_or(DataError::NullKey)?;
    match key {
        KeyValue::Composite(parts) => {
            let fields = resolver.resolve_keys(entity)?;
            if parts.len() != fields.len() {
                return Err(DataError::KeyConversion {
                    entity: entity.to_string(),
                    field: fields
                        .iter()
                        .map(|f| f.name)
                        .collect::<Vec<_>>()
                        .join(", "),
                    expected: fields[0].kind,
                    found: format!("composite key of {} values", parts.len()),
                });
            }
            let mut conditions = Vec::with_capacity(parts.len());
            for (part, field) in parts.iter().zip(fields.iter()) {
                if let KeyValue::Composite(_) = part {
                    return Err(DataError::KeyConversion {
                        entity: entity.to_string(),
                        field: field.name.to_string(),
                        expected: field.kind,
                        found: "nested composite key".to_string(),
                    });
                }
                conditions.push(Predicate::eq(field.name, part.convert_to(entity, field)?));
            }
            Ok(match conditions.len() {
                1 => conditions.remove(0),
                _ => Predicate::And(conditions),
            })
        }
        scalar => {
            let field = resolver.resolve_key(entity)?;
            Ok(Predicate::eq(field.name, scalar.convert_to(entity, &field)?))
        }
    }
}
