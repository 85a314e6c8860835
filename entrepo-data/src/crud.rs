use crate::entity::{Entity, EntityDescriptor, EntityKey, FieldDef, Include};
use crate::error::DataError;
use crate::key::KeyValue;
use crate::metadata::{KeyResolver, MetadataProvider, Model};
use crate::page::{paginate, PagedResult, PagingFilter};
use crate::predicate::{key_equals, Predicate};
use crate::repository::Repository;
use crate::store::{Change, ChangeSet, LinkChange, Query, Store};
use crate::value::Value;
use std::sync::Arc;

/// The [`Repository`] implementation over any [`Store`].
///
/// Composes key resolution, predicate building, sort parsing and pagination
/// against the store, and owns collection reconciliation on update.
///
/// # Example
///
/// ```ignore
/// let repo = EntityRepository::<Post, _>::standalone(MemoryStore::new());
/// repo.add(post).await?;
/// let page = repo
///     .find_all_paged(&PagingFilter::new().with_order_by("date desc"), None, Include::None)
///     .await?;
/// ```
pub struct EntityRepository<E, S> {
    store: S,
    descriptor: Arc<EntityDescriptor<E>>,
    resolver: KeyResolver,
}

impl<E: Entity, S: Store<E>> EntityRepository<E, S> {
    pub fn new(store: S, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            store,
            descriptor: Arc::new(E::descriptor()),
            resolver: KeyResolver::new(metadata),
        }
    }

    /// A repository whose metadata covers `E` alone.
    pub fn standalone(store: S) -> Self {
        Self::new(store, Arc::new(Model::of::<E>()))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn descriptor(&self) -> &EntityDescriptor<E> {
        &self.descriptor
    }

    /// The key field used for scalar key lookups.
    pub fn primary_key(&self) -> Result<FieldDef, DataError> {
        self.resolver.resolve_key(self.descriptor.name())
    }

    pub fn key_of(&self, entity: &E) -> EntityKey {
        self.descriptor.key_of(entity)
    }

    /// `key field == key`, composable with other predicates.
    pub fn key_equals(&self, key: Option<&KeyValue>) -> Result<Predicate, DataError> {
        key_equals(&self.resolver, self.descriptor.name(), key)
    }

    fn check(&self, predicate: Option<&Predicate>, include: &Include) -> Result<(), DataError> {
        if let Some(p) = predicate {
            p.validate(self.descriptor.schema())?;
        }
        include.validate(self.descriptor.schema())
    }

    /// Equality on every key field of an already-persisted identity.
    fn identity_filter(&self, key: &EntityKey) -> Result<Predicate, DataError> {
        let fields = self.resolver.resolve_keys(self.descriptor.name())?;
        let mut parts: Vec<Predicate> = fields
            .iter()
            .zip(&key.0)
            .map(|(def, value)| Predicate::eq(def.name, value.clone()))
            .collect();
        Ok(match parts.len() {
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        })
    }

    async fn first(&self, query: Query) -> Result<Option<E>, DataError> {
        let rows = self.store.fetch(&self.descriptor, &query.take(1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn tracked(&self, key: &EntityKey) -> Result<E, DataError> {
        let query = Query::new()
            .filter(self.identity_filter(key)?)
            .include(Include::All);
        self.first(query).await?.ok_or_else(|| {
            DataError::NotFound(format!("{} with key {key}", self.descriptor.name()))
        })
    }

    /// Diff `detached` against the tracked entity.
    ///
    /// Returns the pending change and the tracked entity as it will read
    /// once the change is committed.
    async fn reconcile(&self, detached: &E) -> Result<(Change<E>, E), DataError> {
        let key = self.descriptor.key_of(detached);
        let mut tracked = self.tracked(&key).await?;

        let mut links = Vec::new();
        for def in self.descriptor.schema().collections() {
            let mut desired: Vec<Value> = Vec::new();
            for member in self.descriptor.collection(detached, def.name)? {
                if !desired.contains(&member) {
                    desired.push(member);
                }
            }
            let current = self.descriptor.collection(&tracked, def.name)?;
            let change = LinkChange {
                collection: def.name.to_string(),
                added: desired
                    .iter()
                    .filter(|m| !current.contains(m))
                    .cloned()
                    .collect(),
                removed: current
                    .iter()
                    .filter(|m| !desired.contains(m))
                    .cloned()
                    .collect(),
            };
            if !change.is_empty() {
                links.push(change);
            }
            self.descriptor.set_collection(&mut tracked, def.name, desired)?;
        }

        let mut fields = Vec::new();
        for (def, value) in self.descriptor.values(detached) {
            if def.primary_key {
                continue;
            }
            if self.descriptor.get(&tracked, def.name)? != value {
                self.descriptor.set(&mut tracked, def.name, value.clone())?;
                fields.push((def.name, value));
            }
        }

        Ok((Change::Update { key, fields, links }, tracked))
    }
}

impl<E, S> Repository<E> for EntityRepository<E, S>
where
    E: Entity,
    S: Store<E>,
{
    async fn count_all(&self) -> Result<u64, DataError> {
        let count = self.store.count(&self.descriptor, None).await?;
        tracing::debug!(entity = self.descriptor.name(), count, "count_all");
        Ok(count)
    }

    async fn count_where(&self, predicate: Predicate) -> Result<u64, DataError> {
        self.check(Some(&predicate), &Include::None)?;
        let count = self.store.count(&self.descriptor, Some(&predicate)).await?;
        tracing::debug!(entity = self.descriptor.name(), count, "count_where");
        Ok(count)
    }

    async fn any(&self, predicate: Predicate) -> Result<bool, DataError> {
        Ok(self.count_where(predicate).await? > 0)
    }

    async fn find(&self, key: &KeyValue) -> Result<Option<E>, DataError> {
        let filter = self.key_equals(Some(key))?;
        let found = self
            .first(Query::new().filter(filter).include(Include::All))
            .await?;
        tracing::debug!(entity = self.descriptor.name(), ?key, found = found.is_some(), "find");
        Ok(found)
    }

    async fn find_including(&self, key: &KeyValue, related: &[&str]) -> Result<Option<E>, DataError> {
        let include = Include::only(related.iter().copied());
        let filter = self.key_equals(Some(key))?;
        self.check(None, &include)?;
        let found = self.first(Query::new().filter(filter).include(include)).await?;
        tracing::debug!(
            entity = self.descriptor.name(),
            ?key,
            ?related,
            found = found.is_some(),
            "find_including"
        );
        Ok(found)
    }

    async fn find_all(&self, predicate: Option<Predicate>, include: Include) -> Result<Vec<E>, DataError> {
        self.check(predicate.as_ref(), &include)?;
        let mut query = Query::new().include(include);
        if let Some(p) = predicate {
            query = query.filter(p);
        }
        let rows = self.store.fetch(&self.descriptor, &query).await?;
        tracing::debug!(entity = self.descriptor.name(), rows = rows.len(), "find_all");
        Ok(rows)
    }

    async fn first_or_default(&self, predicate: Predicate) -> Result<Option<E>, DataError> {
        self.check(Some(&predicate), &Include::None)?;
        self.first(Query::new().filter(predicate)).await
    }

    async fn add(&self, entity: E) -> Result<E, DataError> {
        let mut changes = ChangeSet::new();
        changes.push(Change::Insert(entity.clone()));
        let affected = self.store.save_changes(&self.descriptor, changes).await?;
        tracing::debug!(
            entity = self.descriptor.name(),
            key = %self.descriptor.key_of(&entity),
            affected,
            "add"
        );
        Ok(entity)
    }

    async fn add_range(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        let changes: ChangeSet<E> = entities.iter().cloned().map(Change::Insert).collect();
        let affected = self.store.save_changes(&self.descriptor, changes).await?;
        tracing::debug!(
            entity = self.descriptor.name(),
            count = entities.len(),
            affected,
            "add_range"
        );
        Ok(entities)
    }

    async fn update(&self, entity: &E) -> Result<Option<E>, DataError> {
        let (change, tracked) = self.reconcile(entity).await?;
        let mut changes = ChangeSet::new();
        changes.push(change);
        let affected = self.store.save_changes(&self.descriptor, changes).await?;
        tracing::debug!(
            entity = self.descriptor.name(),
            key = %self.descriptor.key_of(entity),
            affected,
            "update"
        );
        Ok((affected > 0).then_some(tracked))
    }

    async fn update_range(&self, entities: &[E]) -> Result<Option<Vec<E>>, DataError> {
        // A later entry for the same key supersedes the earlier one.
        let mut batch: Vec<(EntityKey, &E)> = Vec::with_capacity(entities.len());
        for entity in entities {
            let key = self.descriptor.key_of(entity);
            match batch.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = entity,
                None => batch.push((key, entity)),
            }
        }

        let mut changes = ChangeSet::new();
        let mut tracked = Vec::with_capacity(batch.len());
        for (_, entity) in batch {
            let (change, updated) = self.reconcile(entity).await?;
            changes.push(change);
            tracked.push(updated);
        }
        let affected = self.store.save_changes(&self.descriptor, changes).await?;
        tracing::debug!(
            entity = self.descriptor.name(),
            count = entities.len(),
            affected,
            "update_range"
        );
        Ok((affected > 0).then_some(tracked))
    }

    async fn remove(&self, entity: &E) -> Result<(), DataError> {
        let key = self.descriptor.key_of(entity);
        let mut changes = ChangeSet::new();
        changes.push(Change::Delete(key.clone()));
        let affected = self.store.save_changes(&self.descriptor, changes).await?;
        tracing::debug!(entity = self.descriptor.name(), %key, affected, "remove");
        if affected == 0 {
            return Err(DataError::NotFound(format!(
                "{} with key {key}",
                self.descriptor.name()
            )));
        }
        Ok(())
    }

    async fn remove_by_key(&self, key: &KeyValue) -> Result<(), DataError> {
        let filter = self.key_equals(Some(key))?;
        let Some(entity) = self.first(Query::new().filter(filter)).await? else {
            tracing::debug!(entity = self.descriptor.name(), ?key, "remove_by_key: no match");
            return Err(DataError::NotFound(format!(
                "{} with key {key:?}",
                self.descriptor.name()
            )));
        };
        self.remove(&entity).await
    }

    async fn find_all_paged(
        &self,
        filter: &PagingFilter,
        predicate: Option<Predicate>,
        include: Include,
    ) -> Result<PagedResult<E>, DataError> {
        self.check(predicate.as_ref(), &include)?;
        let mut query = Query::new().include(include);
        if let Some(p) = predicate {
            query = query.filter(p);
        }
        paginate(
            &self.store,
            &self.descriptor,
            self.resolver.metadata(),
            query,
            filter,
        )
        .await
    }
}

impl<E, S: Clone> Clone for EntityRepository<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            descriptor: self.descriptor.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::{book, Book};
    use crate::memory::MemoryStore;
    use crate::value::ScalarKind;

    fn repo() -> EntityRepository<Book, MemoryStore<Book>> {
        EntityRepository::standalone(MemoryStore::new())
    }

    fn shelved(id: i64, shelves: &[i64]) -> Book {
        let mut b = book(id, &format!("book {id}"), id as f64);
        b.shelves = shelves.to_vec();
        b
    }

    #[tokio::test]
    async fn test_add_then_find_round_trips() {
        let repo = repo();
        let mut b = shelved(1, &[3, 4]);
        b.subtitle = Some("sub".into());
        b.cover = vec![1, 2, 3];
        repo.add(b.clone()).await.unwrap();
        let found = repo.find(&KeyValue::Int(1)).await.unwrap().unwrap();
        assert_eq!(found, b);
        assert!(repo.find(&KeyValue::Int(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_including_loads_named_collections() {
        let repo = repo();
        repo.add(shelved(1, &[3])).await.unwrap();
        let found = repo.find_including(&KeyValue::from("1"), &["shelves"]).await.unwrap();
        assert_eq!(found.unwrap().shelves, vec![3]);
        let err = repo
            .find_including(&KeyValue::Int(1), &["authors"])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::UnknownField { .. }));
    }

    #[tokio::test]
    async fn test_update_reconciles_collections_and_fields() {
        let repo = repo();
        repo.add(shelved(1, &[1, 2, 3])).await.unwrap();

        let mut detached = shelved(1, &[1, 3, 3]);
        detached.title = "renamed".into();
        let updated = repo.update(&detached).await.unwrap().unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.shelves, vec![1, 3]);

        let found = repo.find(&KeyValue::Int(1)).await.unwrap().unwrap();
        assert_eq!(found.shelves, vec![1, 3]);
        assert_eq!(found.title, "renamed");
    }

    #[tokio::test]
    async fn test_update_noop_returns_none() {
        let repo = repo();
        let b = shelved(1, &[1]);
        repo.add(b.clone()).await.unwrap();
        assert!(repo.update(&b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = repo();
        let err = repo.update(&shelved(9, &[])).await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_range_commits_once() {
        let repo = repo();
        repo.add_range(vec![shelved(1, &[]), shelved(2, &[])])
            .await
            .unwrap();
        let mut a = shelved(1, &[7]);
        a.rating = 9.0;
        let b = shelved(2, &[]);
        let updated = repo.update_range(&[a, b]).await.unwrap().unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].shelves, vec![7]);
        assert!(repo.update_range(&[shelved(2, &[])]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_range_repeated_key_applies_last_entry() {
        let repo = repo();
        repo.add(shelved(1, &[1])).await.unwrap();
        let mut first = shelved(1, &[1, 2]);
        first.title = "first".into();
        let mut last = shelved(1, &[2, 3]);
        last.title = "last".into();

        let updated = repo
            .update_range(&[first.clone(), last, first.clone()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].title, "first");
        assert_eq!(updated[0].shelves, vec![1, 2]);

        let mut same = shelved(1, &[4]);
        same.title = "again".into();
        repo.update_range(&[same.clone(), same]).await.unwrap().unwrap();
        let found = repo.find(&KeyValue::Int(1)).await.unwrap().unwrap();
        assert_eq!(found.title, "again");
        assert_eq!(found.shelves, vec![4]);
    }

    #[tokio::test]
    async fn test_page_far_beyond_last_is_empty() {
        let repo = repo();
        repo.add_range(vec![shelved(1, &[]), shelved(2, &[])])
            .await
            .unwrap();
        let filter = PagingFilter::new()
            .with_page_size(10)
            .with_page_number(1_000_000_000_000_000_000);
        let page = repo.find_all_paged(&filter, None, Include::None).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_count(), 2);
        assert_eq!(page.current_page(), 1_000_000_000_000_000_000);
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_remove_paths() {
        let repo = repo();
        repo.add_range(vec![shelved(1, &[1]), shelved(2, &[])])
            .await
            .unwrap();
        repo.remove_by_key(&KeyValue::Int(1)).await.unwrap();
        assert_eq!(repo.count_all().await.unwrap(), 1);
        assert!(matches!(
            repo.remove_by_key(&KeyValue::Int(1)).await,
            Err(DataError::NotFound(_))
        ));
        assert!(matches!(
            repo.remove(&shelved(5, &[])).await,
            Err(DataError::NotFound(_))
        ));
        repo.remove(&shelved(2, &[])).await.unwrap();
        assert_eq!(repo.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_add_conflicts() {
        let repo = repo();
        repo.add(shelved(1, &[])).await.unwrap();
        let err = repo.add(shelved(1, &[])).await.unwrap_err();
        assert!(matches!(err, DataError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_count_where_matches_find_all() {
        let repo = repo();
        repo.add_range((1..=12).map(|i| shelved(i, &[])).collect())
            .await
            .unwrap();
        let predicate = Predicate::gt("rating", 4.0).and(Predicate::le("id", 10i64));
        let count = repo.count_where(predicate.clone()).await.unwrap();
        let rows = repo.find_all(Some(predicate.clone()), Include::None).await.unwrap();
        assert_eq!(count, rows.len() as u64);
        assert_eq!(count, 6);
        assert!(repo.any(predicate).await.unwrap());
        assert!(!repo.any(Predicate::gt("id", 100i64)).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_predicate_is_rejected() {
        let repo = repo();
        let err = repo.count_where(Predicate::eq("title", 1i64)).await.unwrap_err();
        assert!(matches!(err, DataError::InvalidPredicate(_)));
    }

    #[tokio::test]
    async fn test_first_or_default() {
        let repo = repo();
        repo.add_range(vec![shelved(1, &[2]), shelved(2, &[])])
            .await
            .unwrap();
        let first = repo.first_or_default(Predicate::ge("id", 1i64)).await.unwrap();
        assert_eq!(first.unwrap().id, 1);
        assert!(repo
            .first_or_default(Predicate::eq("id", 3i64))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_paged_with_order() {
        let repo = repo();
        repo.add_range((1..=25).map(|i| shelved(i, &[])).collect())
            .await
            .unwrap();
        let filter = PagingFilter::new()
            .with_page_size(10)
            .with_page_number(3)
            .with_order_by("rating desc");
        let page = repo.find_all_paged(&filter, None, Include::None).await.unwrap();
        assert_eq!(page.total_count(), 25);
        assert_eq!(page.total_pages(), 3);
        let ids: Vec<i64> = page.items().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_key_utilities() {
        let repo = repo();
        let key = repo.primary_key().unwrap();
        assert_eq!(key.name, "id");
        assert_eq!(key.kind, ScalarKind::Int);
        assert_eq!(repo.key_of(&book(4, "x", 1.0)), EntityKey(vec![Value::Int(4)]));
        assert_eq!(
            repo.key_equals(Some(&KeyValue::Int(4))).unwrap(),
            Predicate::eq("id", 4i64)
        );
    }
}
