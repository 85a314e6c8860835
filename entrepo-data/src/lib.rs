pub mod config;
pub mod crud;
pub mod entity;
pub mod error;
pub mod key;
pub mod memory;
pub mod metadata;
pub mod page;
pub mod predicate;
pub mod query;
pub mod repository;
pub mod sort;
pub mod store;
pub mod value;

pub use config::{ConfigError, DataConfig, PagingConfig};
pub use crud::EntityRepository;
pub use entity::{
    keys_into, CollectionDef, Entity, EntityDescriptor, EntityKey, EntitySchema, FieldDef, Include,
};
pub use error::DataError;
pub use key::KeyValue;
pub use memory::MemoryStore;
pub use metadata::{KeyResolver, MetadataProvider, Model};
pub use page::{paginate, PagedResult, PagingFilter, DEFAULT_PAGE_SIZE};
pub use predicate::{key_equals, CmpOp, Predicate};
pub use query::{Dialect, IdentifierPolicy, QueryBuilder, QueryError};
pub use repository::Repository;
pub use sort::{parse_order_by, ComparatorChain, Direction, SortField, SortKey};
pub use store::{Change, ChangeSet, LinkChange, Query, Store};
pub use value::{ScalarKind, Value};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        CollectionDef, DataError, Entity, EntityDescriptor, EntityRepository, Include, KeyValue,
        MemoryStore, Model, PagedResult, PagingFilter, Predicate, Repository, ScalarKind, Store,
        Value,
    };
}
