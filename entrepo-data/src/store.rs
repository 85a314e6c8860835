//! The storage-backend boundary: a declarative query shape going in,
//! materialized rows and change sets coming back.

use crate::entity::{Entity, EntityDescriptor, EntityKey, Include};
use crate::error::DataError;
use crate::predicate::Predicate;
use crate::sort::ComparatorChain;
use crate::value::Value;
use std::future::Future;

/// A query over one entity type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Predicate>,
    pub order: Option<ComparatorChain>,
    pub skip: u64,
    pub take: Option<u64>,
    pub include: Include,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order(mut self, chain: ComparatorChain) -> Self {
        self.order = Some(chain);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include = include;
        self
    }
}

/// Link rows to add to or remove from one collection of an entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkChange {
    pub collection: String,
    pub added: Vec<Value>,
    pub removed: Vec<Value>,
}

impl LinkChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A pending modification of persisted state.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<E> {
    /// Insert a new row and one link row per collection member.
    Insert(E),
    /// Apply field-level changes to an existing row.
    Update {
        key: EntityKey,
        fields: Vec<(&'static str, Value)>,
        links: Vec<LinkChange>,
    },
    /// Delete a row and the link rows it owns.
    Delete(EntityKey),
}

/// Changes committed together: all of them or none.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<E> {
    changes: Vec<Change<E>>,
}

impl<E> Default for ChangeSet<E> {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
        }
    }
}

impl<E> ChangeSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change<E>) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change<E>> {
        self.changes.iter()
    }
}

impl<E> IntoIterator for ChangeSet<E> {
    type Item = Change<E>;
    type IntoIter = std::vec::IntoIter<Change<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<E> FromIterator<Change<E>> for ChangeSet<E> {
    fn from_iter<I: IntoIterator<Item = Change<E>>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

/// A storage backend for entities of type `E`.
///
/// Uses RPITIT (return-position `impl Trait` in traits), so no `async-trait` is needed.
///
/// Rows-affected accounting for [`Store::save_changes`]: an insert counts one
/// plus one per link row; an update counts one when at least one field
/// changed on an existing row, plus one per link row added or removed; a
/// delete counts one for the row plus one per owned link row.
pub trait Store<E: Entity>: Send + Sync {
    /// Materialize the rows selected by `query`, collections loaded per
    /// `query.include`.
    fn fetch(
        &self,
        descriptor: &EntityDescriptor<E>,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    /// Count rows matching `filter`, ignoring any window.
    fn count(
        &self,
        descriptor: &EntityDescriptor<E>,
        filter: Option<&Predicate>,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Persist `changes` atomically and report the rows affected.
    fn save_changes(
        &self,
        descriptor: &EntityDescriptor<E>,
        changes: ChangeSet<E>,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;
}
