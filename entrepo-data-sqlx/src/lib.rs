//! # entrepo-data-sqlx - SQLx backend for the entrepo data layer
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-specific
//! storage backend for `entrepo-data`. It interprets the declarative query
//! shape through [`entrepo_data::QueryBuilder`] and commits change sets inside
//! one transaction.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqliteStore`] | `Store` implementation over an `sqlx::SqlitePool` |
//! | [`Tx`] | Transaction wrapper: explicit commit, rollback on drop |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Quick start
//!
//! ```ignore
//! use entrepo_data::prelude::*;
//! use entrepo_data_sqlx::SqliteStore;
//!
//! let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
//! let repo = EntityRepository::<Tag, _>::standalone(SqliteStore::new(pool));
//! let tag = repo.find(&KeyValue::Int(1)).await?;
//! ```
//!
//! # Schema
//!
//! Tables are not created by this crate. Each entity maps to a table named
//! after the entity with one column per scalar field; each collection maps to
//! a link table with `(owner_column, target_column)`, the pair being unique.
//! Entities with composite keys cannot own collections.
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use entrepo_data_sqlx::SqlxErrorExt;
//!
//! let row = sqlx::query("SELECT ...")
//!     .fetch_one(&pool)
//!     .await
//!     .map_err(|e| e.into_data_error())?;
//! ```

pub mod error;
#[cfg(feature = "sqlite")]
pub mod store;
pub mod tx;

pub use error::{SqlxErrorExt, SqlxResult};
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use tx::Tx;

/// Re-exports of the most commonly used types from both `entrepo-data` and this crate.
pub mod prelude {
    #[cfg(feature = "sqlite")]
    pub use crate::SqliteStore;
    pub use crate::{SqlxErrorExt, Tx};
    pub use entrepo_data::prelude::*;
}
