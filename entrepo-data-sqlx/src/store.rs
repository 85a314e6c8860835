use crate::error::{SqlxErrorExt, SqlxResult};
use crate::tx::Tx;
use chrono::{DateTime, Utc};
use entrepo_data::{
    Change, ChangeSet, CollectionDef, DataError, Dialect, Entity, EntityDescriptor, EntityKey,
    EntitySchema, FieldDef, IdentifierPolicy, LinkChange, Predicate, Query, QueryBuilder,
    QueryError, ScalarKind, Store, Value,
};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use std::marker::PhantomData;
use uuid::Uuid;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Owners per link-table lookup, well below SQLite's bind-parameter limit.
const LINK_CHUNK: usize = 500;

/// A [`Store`] over a SQLite pool.
///
/// Tables and link tables must already exist; column names are the field
/// names declared by the entity descriptor. Rows equal under every sort key
/// come back in whatever order SQLite produces.
///
/// # Example
///
/// ```ignore
/// let pool = SqlitePool::connect("sqlite::memory:").await?;
/// let repo = EntityRepository::<Tag, _>::standalone(SqliteStore::new(pool));
/// ```
pub struct SqliteStore<E> {
    pool: SqlitePool,
    builder: QueryBuilder,
    _marker: PhantomData<fn() -> E>,
}

impl<E> SqliteStore<E> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            builder: QueryBuilder::new_with_dialect(Dialect::Sqlite)
                .identifier_policy(IdentifierPolicy::Quote),
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn with_query_builder(mut self, builder: QueryBuilder) -> Self {
        self.builder = builder;
        self
    }
}

impl<E> Clone for SqliteStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            builder: self.builder.clone(),
            _marker: PhantomData,
        }
    }
}

fn bind_value(query: SqliteQuery<'_>, value: Value) -> SqliteQuery<'_> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Uuid(u) => query.bind(u),
        Value::Timestamp(t) => query.bind(t),
        Value::Bytes(b) => query.bind(b),
    }
}

fn prepare(sql: &str, params: Vec<Value>) -> SqliteQuery<'_> {
    params.into_iter().fold(sqlx::query(sql), bind_value)
}

fn decode_value(row: &SqliteRow, column: &str, kind: ScalarKind) -> Result<Value, sqlx::Error> {
    Ok(match kind {
        ScalarKind::Bool => row.try_get::<Option<bool>, _>(column)?.into(),
        ScalarKind::Int => row.try_get::<Option<i64>, _>(column)?.into(),
        ScalarKind::Float => row.try_get::<Option<f64>, _>(column)?.into(),
        ScalarKind::Text => row.try_get::<Option<String>, _>(column)?.into(),
        ScalarKind::Uuid => row.try_get::<Option<Uuid>, _>(column)?.into(),
        ScalarKind::Timestamp => row.try_get::<Option<DateTime<Utc>>, _>(column)?.into(),
        ScalarKind::Bytes => row.try_get::<Option<Vec<u8>>, _>(column)?.into(),
    })
}

fn decode_entity<E: Entity>(descriptor: &EntityDescriptor<E>, row: &SqliteRow) -> SqlxResult<E> {
    let mut entity = E::default();
    for def in descriptor.schema().fields() {
        let value = decode_value(row, def.name, def.kind).map_err(|e| e.into_data_error())?;
        descriptor.set(&mut entity, def.name, value)?;
    }
    Ok(entity)
}

/// The single key value owning link rows.
fn owner_of(schema: &EntitySchema, key: &EntityKey) -> SqlxResult<Value> {
    key.single().cloned().ok_or_else(|| {
        DataError::Query(QueryError::Unsupported(format!(
            "collections of '{}' require a single-field key",
            schema.name()
        )))
    })
}

/// `key field == value` for every key field.
fn identity(schema: &EntitySchema, key: &EntityKey) -> Predicate {
    let mut parts: Vec<Predicate> = schema
        .key_fields()
        .zip(&key.0)
        .map(|(def, value)| Predicate::eq(def.name, value.clone()))
        .collect();
    match parts.len() {
        1 => parts.remove(0),
        _ => Predicate::And(parts),
    }
}

fn key_field(schema: &EntitySchema) -> SqlxResult<&FieldDef> {
    schema.key_fields().next().ok_or_else(|| DataError::NoPrimaryKey(schema.name().to_string()))
}

impl<E: Entity> SqliteStore<E> {
    async fn execute(&self, tx: &mut Tx<'static, Sqlite>, (sql, params): (String, Vec<Value>)) -> SqlxResult<u64> {
        tracing::trace!(%sql, params = params.len(), "execute");
        let done = prepare(&sql, params)
            .execute(tx.as_mut())
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(done.rows_affected())
    }

    async fn exists(&self, tx: &mut Tx<'static, Sqlite>, schema: &EntitySchema, key: &EntityKey) -> SqlxResult<bool> {
        let (sql, params) = self.builder.build_count(schema, Some(&identity(schema, key)))?;
        let row = prepare(&sql, params)
            .fetch_one(tx.as_mut())
            .await
            .map_err(|e| e.into_data_error())?;
        let count: i64 = row.try_get(0).map_err(|e| e.into_data_error())?;
        Ok(count > 0)
    }

    /// Fill the collections named by `query.include` from their link tables.
    async fn load_links(
        &self,
        descriptor: &EntityDescriptor<E>,
        entities: &mut [E],
        query: &Query,
    ) -> SqlxResult<()> {
        let schema = descriptor.schema();
        let included: Vec<&CollectionDef> = schema
            .collections()
            .iter()
            .filter(|def| query.include.includes(def.name))
            .collect();
        if included.is_empty() || entities.is_empty() {
            return Ok(());
        }
        let key_kind = key_field(schema)?.kind;
        let owners = entities
            .iter()
            .map(|e| owner_of(schema, &descriptor.key_of(e)))
            .collect::<SqlxResult<Vec<Value>>>()?;

        for def in included {
            let mut links: Vec<(Value, Value)> = Vec::new();
            for chunk in owners.chunks(LINK_CHUNK) {
                let (sql, params) = self.builder.build_link_select(def, chunk)?;
                tracing::trace!(%sql, "load links");
                let rows = prepare(&sql, params)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| e.into_data_error())?;
                for row in &rows {
                    let owner = decode_value(row, def.owner_column, key_kind)
                        .map_err(|e| e.into_data_error())?;
                    let target = decode_value(row, def.target_column, def.target_kind)
                        .map_err(|e| e.into_data_error())?;
                    links.push((owner, target));
                }
            }
            for (entity, owner) in entities.iter_mut().zip(&owners) {
                let members = links
                    .iter()
                    .filter(|(o, _)| o == owner)
                    .map(|(_, target)| target.clone())
                    .collect();
                descriptor.set_collection(entity, def.name, members)?;
            }
        }
        Ok(())
    }

    async fn apply(
        &self,
        tx: &mut Tx<'static, Sqlite>,
        descriptor: &EntityDescriptor<E>,
        change: Change<E>,
    ) -> SqlxResult<u64> {
        let schema = descriptor.schema();
        match change {
            Change::Insert(entity) => {
                let mut affected = self
                    .execute(tx, self.builder.build_insert(schema, descriptor.values(&entity))?)
                    .await?;
                for def in schema.collections() {
                    let owner = owner_of(schema, &descriptor.key_of(&entity))?;
                    let mut seen: Vec<Value> = Vec::new();
                    for target in descriptor.collection(&entity, def.name)? {
                        if seen.contains(&target) {
                            continue;
                        }
                        affected += self
                            .execute(tx, self.builder.build_link_insert(def, &owner, &target)?)
                            .await?;
                        seen.push(target);
                    }
                }
                Ok(affected)
            }
            Change::Update { key, fields, links } => {
                if !self.exists(tx, schema, &key).await? {
                    return Ok(0);
                }
                let mut affected = 0;
                if !fields.is_empty() {
                    affected += self
                        .execute(tx, self.builder.build_update(schema, &key, &fields)?)
                        .await?;
                }
                for LinkChange {
                    collection,
                    added,
                    removed,
                } in links
                {
                    let def = schema.collection(&collection).ok_or_else(|| DataError::UnknownField {
                        entity: schema.name().to_string(),
                        field: collection.clone(),
                    })?;
                    let owner = owner_of(schema, &key)?;
                    for target in &removed {
                        affected += self
                            .execute(tx, self.builder.build_link_delete(def, &owner, target)?)
                            .await?;
                    }
                    for target in &added {
                        affected += self
                            .execute(tx, self.builder.build_link_insert(def, &owner, target)?)
                            .await?;
                    }
                }
                Ok(affected)
            }
            Change::Delete(key) => {
                if !self.exists(tx, schema, &key).await? {
                    return Ok(0);
                }
                let mut affected = 0;
                for def in schema.collections() {
                    let owner = owner_of(schema, &key)?;
                    affected += self
                        .execute(tx, self.builder.build_link_delete_owner(def, &owner)?)
                        .await?;
                }
                affected += self.execute(tx, self.builder.build_delete(schema, &key)?).await?;
                Ok(affected)
            }
        }
    }
}

impl<E: Entity> Store<E> for SqliteStore<E> {
    async fn fetch(&self, descriptor: &EntityDescriptor<E>, query: &Query) -> Result<Vec<E>, DataError> {
        let (sql, params) = self.builder.build_select(descriptor.schema(), query)?;
        tracing::trace!(entity = descriptor.name(), %sql, "fetch");
        let rows = prepare(&sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        let mut entities = rows
            .iter()
            .map(|row| decode_entity(descriptor, row))
            .collect::<SqlxResult<Vec<E>>>()?;
        self.load_links(descriptor, &mut entities, query).await?;
        Ok(entities)
    }

    async fn count(&self, descriptor: &EntityDescriptor<E>, filter: Option<&Predicate>) -> Result<u64, DataError> {
        let (sql, params) = self.builder.build_count(descriptor.schema(), filter)?;
        tracing::trace!(entity = descriptor.name(), %sql, "count");
        let row = prepare(&sql, params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        let count: i64 = row.try_get(0).map_err(|e| e.into_data_error())?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn save_changes(&self, descriptor: &EntityDescriptor<E>, changes: ChangeSet<E>) -> Result<u64, DataError> {
        let mut tx = Tx::begin(&self.pool).await?;
        let mut affected = 0;
        for change in changes {
            affected += self.apply(&mut tx, descriptor, change).await?;
        }
        tx.commit().await?;
        tracing::debug!(entity = descriptor.name(), affected, "committed change set");
        Ok(affected)
    }
}
