use crate::error::DataError;
use crate::value::{ScalarKind, Value};
use serde::Serialize;

/// Trait representing a persisted entity type.
///
/// Implementors supply a descriptor built once at registration time. The
/// descriptor carries the field accessors and the collection-valued fields,
/// so no runtime introspection is needed.
///
/// # Example
///
/// ```ignore
/// impl Entity for Tag {
///     fn descriptor() -> EntityDescriptor<Self> {
///         EntityDescriptor::<Self>::builder("tags")
///             .key("id", ScalarKind::Int, |t| t.id.into(), |t, v| {
///                 t.id = v.try_into()?;
///                 Ok(())
///             })
///             .field("name", ScalarKind::Text, |t| t.name.clone().into(), |t, v| {
///                 t.name = v.try_into()?;
///                 Ok(())
///             })
///             .build()
///     }
/// }
/// ```
pub trait Entity: Clone + Default + Send + Sync + Unpin + 'static {
    fn descriptor() -> EntityDescriptor<Self>;
}

/// Metadata of one scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: ScalarKind,
    pub primary_key: bool,
    pub nullable: bool,
}

/// Metadata of one collection-valued field.
///
/// Members are referenced by the related entity's key and persisted as rows
/// of a link table `(owner_column, target_column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionDef {
    pub name: &'static str,
    pub target: &'static str,
    pub target_kind: ScalarKind,
    pub link_table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
}

/// Accessor-free metadata of an entity type.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySchema {
    name: &'static str,
    fields: Vec<FieldDef>,
    collections: Vec<CollectionDef>,
}

impl EntitySchema {
    /// Entity name, also used as the table name by SQL stores.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn collections(&self) -> &[CollectionDef] {
        &self.collections
    }

    /// Primary-key fields in declaration order.
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionDef> {
        self.collections.iter().find(|c| c.name == name)
    }
}

/// The persisted identity of an entity: its key values in key-field order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityKey(pub Vec<Value>);

impl EntityKey {
    /// The key value when the key has exactly one field.
    pub fn single(&self) -> Option<&Value> {
        match self.0.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Which collection-valued fields to load with an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Include {
    #[default]
    None,
    All,
    Only(Vec<String>),
}

impl Include {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Include::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, collection: &str) -> bool {
        match self {
            Include::None => false,
            Include::All => true,
            Include::Only(names) => names.iter().any(|n| n == collection),
        }
    }

    pub(crate) fn validate(&self, schema: &EntitySchema) -> Result<(), DataError> {
        if let Include::Only(names) = self {
            for name in names {
                if schema.collection(name).is_none() {
                    return Err(DataError::unknown_field(schema.name(), name));
                }
            }
        }
        Ok(())
    }
}

pub type Getter<E> = fn(&E) -> Value;
pub type Setter<E> = fn(&mut E, Value) -> Result<(), DataError>;
pub type KeysGetter<E> = fn(&E) -> Vec<Value>;
pub type KeysSetter<E> = fn(&mut E, Vec<Value>) -> Result<(), DataError>;

struct FieldAccessor<E> {
    def: FieldDef,
    get: Getter<E>,
    set: Setter<E>,
}

struct CollectionAccessor<E> {
    def: CollectionDef,
    get: KeysGetter<E>,
    set: KeysSetter<E>,
}

/// Per-entity capability table: schema plus field and collection accessors.
pub struct EntityDescriptor<E> {
    schema: EntitySchema,
    fields: Vec<FieldAccessor<E>>,
    collections: Vec<CollectionAccessor<E>>,
}

impl<E> EntityDescriptor<E> {
    pub fn builder(name: &'static str) -> EntityDescriptorBuilder<E> {
        EntityDescriptorBuilder {
            name,
            fields: Vec::new(),
            collections: Vec::new(),
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub fn key_of(&self, entity: &E) -> EntityKey {
        EntityKey(
            self.fields
                .iter()
                .filter(|f| f.def.primary_key)
                .map(|f| (f.get)(entity))
                .collect(),
        )
    }

    pub fn get(&self, entity: &E, field: &str) -> Result<Value, DataError> {
        self.fields
            .iter()
            .find(|f| f.def.name == field)
            .map(|f| (f.get)(entity))
            .ok_or_else(|| DataError::unknown_field(self.name(), field))
    }

    pub fn set(&self, entity: &mut E, field: &str, value: Value) -> Result<(), DataError> {
        let accessor = self
            .fields
            .iter()
            .find(|f| f.def.name == field)
            .ok_or_else(|| DataError::unknown_field(self.name(), field))?;
        if value.is_null() && !accessor.def.nullable {
            return Err(DataError::TypeMismatch {
                expected: accessor.def.kind,
                found: "null",
            });
        }
        (accessor.set)(entity, value)
    }

    /// Scalar values of every field, in declaration order.
    pub fn values(&self, entity: &E) -> Vec<(FieldDef, Value)> {
        self.fields
            .iter()
            .map(|f| (f.def, (f.get)(entity)))
            .collect()
    }

    pub fn collection(&self, entity: &E, name: &str) -> Result<Vec<Value>, DataError> {
        self.collections
            .iter()
            .find(|c| c.def.name == name)
            .map(|c| (c.get)(entity))
            .ok_or_else(|| DataError::unknown_field(self.name(), name))
    }

    pub fn set_collection(
        &self,
        entity: &mut E,
        name: &str,
        keys: Vec<Value>,
    ) -> Result<(), DataError> {
        let accessor = self
            .collections
            .iter()
            .find(|c| c.def.name == name)
            .ok_or_else(|| DataError::unknown_field(self.name(), name))?;
        (accessor.set)(entity, keys)
    }

    /// Empty every collection that `include` does not name.
    pub fn retain_collections(&self, entity: &mut E, include: &Include) -> Result<(), DataError> {
        for accessor in &self.collections {
            if !include.includes(accessor.def.name) {
                (accessor.set)(entity, Vec::new())?;
            }
        }
        Ok(())
    }
}

pub struct EntityDescriptorBuilder<E> {
    name: &'static str,
    fields: Vec<FieldAccessor<E>>,
    collections: Vec<CollectionAccessor<E>>,
}

impl<E> EntityDescriptorBuilder<E> {
    /// Declare a primary-key field. Call repeatedly for composite keys.
    pub fn key(self, name: &'static str, kind: ScalarKind, get: Getter<E>, set: Setter<E>) -> Self {
        self.push_field(name, kind, true, false, get, set)
    }

    pub fn field(self, name: &'static str, kind: ScalarKind, get: Getter<E>, set: Setter<E>) -> Self {
        self.push_field(name, kind, false, false, get, set)
    }

    /// Declare a field that accepts `Value::Null`.
    pub fn nullable(
        self,
        name: &'static str,
        kind: ScalarKind,
        get: Getter<E>,
        set: Setter<E>,
    ) -> Self {
        self.push_field(name, kind, false, true, get, set)
    }

    pub fn collection(mut self, def: CollectionDef, get: KeysGetter<E>, set: KeysSetter<E>) -> Self {
        self.collections.push(CollectionAccessor { def, get, set });
        self
    }

    pub fn build(self) -> EntityDescriptor<E> {
        let schema = EntitySchema {
            name: self.name,
            fields: self.fields.iter().map(|f| f.def).collect(),
            collections: self.collections.iter().map(|c| c.def).collect(),
        };
        EntityDescriptor {
            schema,
            fields: self.fields,
            collections: self.collections,
        }
    }

    fn push_field(
        mut self,
        name: &'static str,
        kind: ScalarKind,
        primary_key: bool,
        nullable: bool,
        get: Getter<E>,
        set: Setter<E>,
    ) -> Self {
        self.fields.push(FieldAccessor {
            def: FieldDef {
                name,
                kind,
                primary_key,
                nullable,
            },
            get,
            set,
        });
        self
    }
}

/// Convert related keys read from a store into a typed collection.
pub fn keys_into<T>(keys: Vec<Value>) -> Result<Vec<T>, DataError>
where
    T: TryFrom<Value, Error = DataError>,
{
    keys.into_iter().map(T::try_from).collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_schema_reflects_builder() {
        let descriptor = Book::descriptor();
        let schema = descriptor.schema();
        assert_eq!(schema.name(), "books");
        let keys: Vec<_> = schema.key_fields().map(|f| f.name).collect();
        assert_eq!(keys, vec!["id"]);
        assert_eq!(schema.field("rating").unwrap().kind, ScalarKind::Float);
        assert!(schema.field("shelves").is_none());
        assert_eq!(schema.collection("shelves").unwrap().link_table, "book_shelves");
    }

    #[test]
    fn test_get_and_set() {
        let descriptor = Book::descriptor();
        let mut b = book(7, "Dune", 4.5);
        assert_eq!(descriptor.get(&b, "title").unwrap(), Value::Text("Dune".into()));
        descriptor
            .set(&mut b, "title", Value::Text("Emma".into()))
            .unwrap();
        assert_eq!(b.title, "Emma");
        assert_eq!(descriptor.key_of(&b), EntityKey(vec![Value::Int(7)]));
    }

    #[test]
    fn test_set_rejects_null_on_required_field() {
        let descriptor = Book::descriptor();
        let mut b = book(1, "x", 1.0);
        assert!(descriptor.set(&mut b, "title", Value::Null).is_err());
        descriptor.set(&mut b, "subtitle", Value::Null).unwrap();
        assert_eq!(b.subtitle, None);
    }

    #[test]
    fn test_unknown_field() {
        let descriptor = Book::descriptor();
        let b = book(1, "x", 1.0);
        assert!(matches!(
            descriptor.get(&b, "nope"),
            Err(DataError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_retain_collections() {
        let descriptor = Book::descriptor();
        let mut b = book(1, "x", 1.0);
        b.shelves = vec![1, 2];
        descriptor
            .retain_collections(&mut b, &Include::only(["shelves"]))
            .unwrap();
        assert_eq!(b.shelves, vec![1, 2]);
        descriptor.retain_collections(&mut b, &Include::None).unwrap();
        assert!(b.shelves.is_empty());
    }
}
