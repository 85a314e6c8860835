use crate::entity::{Entity, Include};
use crate::error::DataError;
use crate::key::KeyValue;
use crate::page::{PagedResult, PagingFilter};
use crate::predicate::Predicate;
use std::future::Future;

/// Generic async repository trait for CRUD operations.
///
/// Uses RPITIT (return-position `impl Trait` in traits), so no `async-trait` is needed.
///
/// Read paths report absence as `None` or an empty result; mutation paths
/// fail with [`DataError::NotFound`].
pub trait Repository<E: Entity>: Send + Sync {
    fn count_all(&self) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn count_where(&self, predicate: Predicate) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn any(&self, predicate: Predicate) -> impl Future<Output = Result<bool, DataError>> + Send;

    /// Look up by key with every collection loaded.
    fn find(&self, key: &KeyValue) -> impl Future<Output = Result<Option<E>, DataError>> + Send;

    /// Look up by key loading only the named collections.
    fn find_including(
        &self,
        key: &KeyValue,
        related: &[&str],
    ) -> impl Future<Output = Result<Option<E>, DataError>> + Send;

    fn find_all(
        &self,
        predicate: Option<Predicate>,
        include: Include,
    ) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    fn first_or_default(&self, predicate: Predicate) -> impl Future<Output = Result<Option<E>, DataError>> + Send;

    fn add(&self, entity: E) -> impl Future<Output = Result<E, DataError>> + Send;

    fn add_range(&self, entities: Vec<E>) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    /// Reconcile `entity` into its persisted counterpart.
    ///
    /// Yields `Ok(None)` when the commit changed zero rows.
    fn update(&self, entity: &E) -> impl Future<Output = Result<Option<E>, DataError>> + Send;

    /// Reconcile every entity in one change set. When a key repeats, the
    /// last entry for it wins and one tracked entity is returned per key.
    fn update_range(&self, entities: &[E]) -> impl Future<Output = Result<Option<Vec<E>>, DataError>> + Send;

    fn remove(&self, entity: &E) -> impl Future<Output = Result<(), DataError>> + Send;

    fn remove_by_key(&self, key: &KeyValue) -> impl Future<Output = Result<(), DataError>> + Send;

    fn find_all_paged(
        &self,
        filter: &PagingFilter,
        predicate: Option<Predicate>,
        include: Include,
    ) -> impl Future<Output = Result<PagedResult<E>, DataError>> + Send;
}
