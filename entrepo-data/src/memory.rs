//! In-memory reference store.

use crate::entity::{Entity, EntityDescriptor, EntityKey, Include};
use crate::error::DataError;
use crate::predicate::Predicate;
use crate::store::{Change, ChangeSet, LinkChange, Query, Store};
use crate::value::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A [`Store`] keeping rows in insertion order behind an async lock.
///
/// Collections are kept as link rows, separately from the entity rows, the
/// way a relational store keeps them in link tables. Sorting is stable, so
/// insertion order is the positional tiebreak.
pub struct MemoryStore<E> {
    tables: RwLock<Tables<E>>,
}

struct Tables<E> {
    rows: Vec<E>,
    links: HashMap<&'static str, Vec<(EntityKey, Value)>>,
}

impl<E: Clone> Clone for Tables<E> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            links: self.links.clone(),
        }
    }
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self {
            tables: RwLock::new(Tables {
                rows: Vec::new(),
                links: HashMap::new(),
            }),
        }
    }
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Entity> Tables<E> {
    fn position(&self, descriptor: &EntityDescriptor<E>, key: &EntityKey) -> Option<usize> {
        self.rows.iter().position(|row| &descriptor.key_of(row) == key)
    }

    fn links_of(&self, collection: &'static str, owner: &EntityKey) -> Vec<Value> {
        self.links
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|(o, _)| o == owner)
                    .map(|(_, target)| target.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A row with every collection loaded.
    fn hydrate(&self, descriptor: &EntityDescriptor<E>, row: &E) -> Result<E, DataError> {
        let mut entity = row.clone();
        let owner = descriptor.key_of(row);
        for def in descriptor.schema().collections() {
            descriptor.set_collection(&mut entity, def.name, self.links_of(def.name, &owner))?;
        }
        Ok(entity)
    }

    fn matching(
        &self,
        descriptor: &EntityDescriptor<E>,
        filter: Option<&Predicate>,
    ) -> Result<Vec<E>, DataError> {
        let mut out = Vec::new();
        for row in &self.rows {
            let entity = self.hydrate(descriptor, row)?;
            let keep = match filter {
                Some(p) => p.evaluate(descriptor, &entity)?,
                None => true,
            };
            if keep {
                out.push(entity);
            }
        }
        Ok(out)
    }

    fn insert_link(&mut self, collection: &'static str, owner: &EntityKey, target: Value) -> u64 {
        let rows = self.links.entry(collection).or_default();
        if rows.iter().any(|(o, t)| o == owner && *t == target) {
            return 0;
        }
        rows.push((owner.clone(), target));
        1
    }

    fn remove_link(&mut self, collection: &'static str, owner: &EntityKey, target: &Value) -> u64 {
        let Some(rows) = self.links.get_mut(collection) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|(o, t)| !(o == owner && t == target));
        (before - rows.len()) as u64
    }

    fn apply(&mut self, descriptor: &EntityDescriptor<E>, change: Change<E>) -> Result<u64, DataError> {
        match change {
            Change::Insert(entity) => {
                let key = descriptor.key_of(&entity);
                if self.position(descriptor, &key).is_some() {
                    return Err(DataError::Conflict(format!(
                        "{} with key {key} already exists",
                        descriptor.name()
                    )));
                }
                let mut affected = 1;
                for def in descriptor.schema().collections() {
                    for target in descriptor.collection(&entity, def.name)? {
                        affected += self.insert_link(def.name, &key, target);
                    }
                }
                let mut row = entity;
                descriptor.retain_collections(&mut row, &Include::None)?;
                self.rows.push(row);
                Ok(affected)
            }
            Change::Update { key, fields, links } => {
                let Some(index) = self.position(descriptor, &key) else {
                    return Ok(0);
                };
                let mut affected = 0;
                if !fields.is_empty() {
                    let row = &mut self.rows[index];
                    for (field, value) in fields {
                        descriptor.set(row, field, value)?;
                    }
                    affected += 1;
                }
                for LinkChange {
                    collection,
                    added,
                    removed,
                } in links
                {
                    let def = descriptor
                        .schema()
                        .collection(&collection)
                        .ok_or_else(|| DataError::unknown_field(descriptor.name(), &collection))?;
                    for target in &removed {
                        affected += self.remove_link(def.name, &key, target);
                    }
                    for target in added {
                        affected += self.insert_link(def.name, &key, target);
                    }
                }
                Ok(affected)
            }
            Change::Delete(key) => {
                let Some(index) = self.position(descriptor, &key) else {
                    return Ok(0);
                };
                self.rows.remove(index);
                let mut affected = 1;
                for def in descriptor.schema().collections() {
                    if let Some(rows) = self.links.get_mut(def.name) {
                        let before = rows.len();
                        rows.retain(|(owner, _)| owner != &key);
                        affected += (before - rows.len()) as u64;
                    }
                }
                Ok(affected)
            }
        }
    }
}

impl<E: Entity> Store<E> for MemoryStore<E> {
    async fn fetch(&self, descriptor: &EntityDescriptor<E>, query: &Query) -> Result<Vec<E>, DataError> {
        let tables = self.tables.read().await;
        let mut rows = tables.matching(descriptor, query.filter.as_ref())?;
        drop(tables);

        if let Some(chain) = &query.order {
            chain.sort(descriptor, &mut rows);
        }
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let take = query
            .take
            .map_or(usize::MAX, |t| usize::try_from(t).unwrap_or(usize::MAX));
        let mut page: Vec<E> = rows.into_iter().skip(skip).take(take).collect();
        for entity in &mut page {
            descriptor.retain_collections(entity, &query.include)?;
        }
        tracing::trace!(entity = descriptor.name(), rows = page.len(), "memory fetch");
        Ok(page)
    }

    async fn count(&self, descriptor: &EntityDescriptor<E>, filter: Option<&Predicate>) -> Result<u64, DataError> {
        let tables = self.tables.read().await;
        match filter {
            None => Ok(tables.rows.len() as u64),
            Some(_) => Ok(tables.matching(descriptor, filter)?.len() as u64),
        }
    }

    async fn save_changes(&self, descriptor: &EntityDescriptor<E>, changes: ChangeSet<E>) -> Result<u64, DataError> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let mut affected = 0;
        for change in changes {
            affected += staged.apply(descriptor, change)?;
        }
        *tables = staged;
        tracing::trace!(entity = descriptor.name(), affected, "memory commit");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::{book, Book};
    use crate::metadata::Model;
    use crate::sort::{ComparatorChain, Direction, SortField};

    async fn seeded() -> (MemoryStore<Book>, EntityDescriptor<Book>) {
        let store = MemoryStore::new();
        let descriptor = Book::descriptor();
        let mut changes = ChangeSet::new();
        for (id, title) in [(1, "c"), (2, "a"), (3, "b")] {
            let mut b = book(id, title, id as f64);
            b.shelves = vec![10, 20];
            changes.push(Change::Insert(b));
        }
        let affected = store.save_changes(&descriptor, changes).await.unwrap();
        assert_eq!(affected, 9);
        (store, descriptor)
    }

    #[tokio::test]
    async fn test_fetch_window_and_order() {
        let (store, descriptor) = seeded().await;
        let model = Model::of::<Book>();
        let chain = ComparatorChain::build(
            &[SortField::new("title", Direction::Ascending)],
            "books",
            &model,
        )
        .unwrap();
        let rows = store
            .fetch(&descriptor, &Query::new().order(chain).skip(1).take(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "b");
        assert!(rows[0].shelves.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_includes_collections() {
        let (store, descriptor) = seeded().await;
        let rows = store
            .fetch(
                &descriptor,
                &Query::new().filter(Predicate::eq("id", 2i64)).include(Include::All),
            )
            .await
            .unwrap();
        assert_eq!(rows[0].shelves, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rolls_back_whole_set() {
        let (store, descriptor) = seeded().await;
        let mut changes = ChangeSet::new();
        changes.push(Change::Insert(book(4, "d", 4.0)));
        changes.push(Change::Insert(book(1, "dup", 1.0)));
        let err = store.save_changes(&descriptor, changes).await.unwrap_err();
        assert!(matches!(err, DataError::Conflict(_)));
        assert_eq!(store.count(&descriptor, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_counts_rows() {
        let (store, descriptor) = seeded().await;
        let key = EntityKey(vec![Value::Int(1)]);
        let mut changes = ChangeSet::new();
        changes.push(Change::Update {
            key: key.clone(),
            fields: vec![("title", Value::Text("z".into()))],
            links: vec![LinkChange {
                collection: "shelves".into(),
                added: vec![Value::Int(30)],
                removed: vec![Value::Int(10)],
            }],
        });
        assert_eq!(store.save_changes(&descriptor, changes).await.unwrap(), 3);

        let mut missing = ChangeSet::new();
        missing.push(Change::Update {
            key: EntityKey(vec![Value::Int(99)]),
            fields: vec![("title", Value::Text("z".into()))],
            links: vec![],
        });
        assert_eq!(store.save_changes(&descriptor, missing).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_owned_links() {
        let (store, descriptor) = seeded().await;
        let mut changes = ChangeSet::new();
        changes.push(Change::Delete(EntityKey(vec![Value::Int(2)])));
        assert_eq!(store.save_changes(&descriptor, changes).await.unwrap(), 3);
        assert_eq!(store.count(&descriptor, None).await.unwrap(), 2);
    }
}
