use crate::value::ScalarKind;

/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    /// The entity type has no primary key registered with the metadata provider.
    NoPrimaryKey(String),
    /// A key value was missing (`null`) where one is required.
    NullKey,
    /// A key value could not be converted to the key field's declared kind.
    KeyConversion {
        entity: String,
        field: String,
        expected: ScalarKind,
        found: String,
    },
    /// A requested sort field has a kind without a natural total order.
    UnsortableField { field: String, kind: ScalarKind },
    NotFound(String),
    /// A field or collection name is not declared on the entity.
    UnknownField { entity: String, field: String },
    InvalidPredicate(String),
    /// A value of the wrong kind was handed to a field accessor.
    TypeMismatch {
        expected: ScalarKind,
        found: &'static str,
    },
    /// A change conflicts with persisted state (e.g. a duplicate key).
    Conflict(String),
    /// A statement could not be rendered.
    Query(crate::query::QueryError),
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `entrepo-data-sqlx`) to wrap
    /// driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub(crate) fn unknown_field(entity: &str, field: &str) -> Self {
        DataError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NoPrimaryKey(entity) => {
                write!(f, "Entity '{entity}' does not have any primary key defined")
            }
            DataError::NullKey => write!(f, "Key value must not be null"),
            DataError::KeyConversion {
                entity,
                field,
                expected,
                found,
            } => write!(
                f,
                "Cannot assign {found} to key '{entity}.{field}' of type {expected}"
            ),
            DataError::UnsortableField { field, kind } => {
                write!(f, "Field '{field}' of type {kind} cannot be sorted")
            }
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::UnknownField { entity, field } => {
                write!(f, "Unknown field '{field}' on entity '{entity}'")
            }
            DataError::InvalidPredicate(msg) => write!(f, "Invalid predicate: {msg}"),
            DataError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected}, found {found}")
            }
            DataError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            DataError::Query(err) => write!(f, "Query error: {err}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            DataError::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<crate::query::QueryError> for DataError {
    fn from(err: crate::query::QueryError) -> Self {
        DataError::Query(err)
    }
}
