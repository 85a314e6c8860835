//! Entity metadata lookup and primary-key resolution.

use crate::entity::{Entity, EntitySchema, FieldDef};
use crate::error::DataError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of entity metadata used by the key resolver and the sort parser.
pub trait MetadataProvider: Send + Sync {
    /// Primary-key fields of `entity` in declaration order; empty when the
    /// entity is unknown or declares no key.
    fn primary_key_of(&self, entity: &str) -> Vec<FieldDef>;

    /// A scalar field of `entity`, if declared.
    fn field_of(&self, entity: &str, field: &str) -> Option<FieldDef>;
}

/// Registration-time metadata for a set of entity types.
///
/// ```ignore
/// let model = Model::builder().register::<Tag>().register::<Blog>().build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Model {
    schemas: HashMap<&'static str, Arc<EntitySchema>>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// A model containing a single entity type.
    pub fn of<E: Entity>() -> Self {
        Self::builder().register::<E>().build()
    }

    pub fn schema(&self, entity: &str) -> Option<&EntitySchema> {
        self.schemas.get(entity).map(|s| s.as_ref())
    }
}

impl MetadataProvider for Model {
    fn primary_key_of(&self, entity: &str) -> Vec<FieldDef> {
        self.schema(entity)
            .map(|s| s.key_fields().copied().collect())
            .unwrap_or_default()
    }

    fn field_of(&self, entity: &str, field: &str) -> Option<FieldDef> {
        self.schema(entity).and_then(|s| s.field(field)).copied()
    }
}

#[derive(Debug, Default)]
pub struct ModelBuilder {
    schemas: HashMap<&'static str, Arc<EntitySchema>>,
}

impl ModelBuilder {
    pub fn register<E: Entity>(mut self) -> Self {
        let descriptor = E::descriptor();
        let schema = descriptor.schema().clone();
        self.schemas.insert(schema.name(), Arc::new(schema));
        self
    }

    pub fn build(self) -> Model {
        Model {
            schemas: self.schemas,
        }
    }
}

/// Resolves primary keys through a [`MetadataProvider`], caching per entity.
///
/// The cache is populated lazily and may be filled concurrently; every
/// racer computes the same value.
#[derive(Clone)]
pub struct KeyResolver {
    metadata: Arc<dyn MetadataProvider>,
    cache: Arc<DashMap<String, Arc<[FieldDef]>>>,
}

impl KeyResolver {
    pub fn new(metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            metadata,
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    /// The key field used for scalar key lookups (the first reported key).
    pub fn resolve_key(&self, entity: &str) -> Result<FieldDef, DataError> {
        let keys = self.resolve_keys(entity)?;
        Ok(keys[0])
    }

    /// Every key field, in declaration order. Never empty on success.
    pub fn resolve_keys(&self, entity: &str) -> Result<Arc<[FieldDef]>, DataError> {
        if let Some(keys) = self.cache.get(entity) {
            return Ok(keys.clone());
        }
        let keys = self.metadata.primary_key_of(entity);
        if keys.is_empty() {
            return Err(DataError::NoPrimaryKey(entity.to_string()));
        }
        let keys: Arc<[FieldDef]> = keys.into();
        self.cache.insert(entity.to_string(), keys.clone());
        tracing::trace!(entity, key = keys[0].name, "resolved primary key");
        Ok(keys)
    }
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver")
            .field("cached", &self.cache.len())
            .finish()
    }
}
