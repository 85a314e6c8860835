//! Transaction wrapper used to commit change sets.

use crate::error::{SqlxErrorExt, SqlxResult};
use sqlx::{Database, Pool, Transaction};
use std::ops::{Deref, DerefMut};

/// A wrapper around SQLx [`Transaction`].
///
/// - [`Tx::begin`] starts a transaction from the pool
/// - [`Tx::commit`] commits it
/// - dropping an uncommitted `Tx` rolls it back
///
/// # Example
///
/// ```ignore
/// let mut tx = Tx::begin(&pool).await?;
/// sqlx::query("DELETE FROM tags WHERE id = ?")
///     .bind(3_i64)
///     .execute(tx.as_mut())
///     .await
///     .map_err(|e| e.into_data_error())?;
/// tx.commit().await?;
/// ```
pub struct Tx<'a, DB: Database>(pub Transaction<'a, DB>);

impl<'a, DB: Database> Deref for Tx<'a, DB> {
    type Target = Transaction<'a, DB>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, DB: Database> DerefMut for Tx<'a, DB> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<DB: Database> Tx<'static, DB> {
    pub async fn begin(pool: &Pool<DB>) -> SqlxResult<Self> {
        let tx = pool.begin().await.map_err(|e| e.into_data_error())?;
        Ok(Tx(tx))
    }
}

impl<'a, DB: Database> Tx<'a, DB> {
    /// Unwraps the `Tx` into the inner `Transaction`.
    pub fn into_inner(self) -> Transaction<'a, DB> {
        self.0
    }

    /// Returns a mutable reference to the underlying connection.
    pub fn as_mut(&mut self) -> &mut <DB as Database>::Connection {
        &mut *self.0
    }

    pub async fn commit(self) -> SqlxResult<()> {
        self.into_inner()
            .commit()
            .await
            .map_err(|e| e.into_data_error())
    }
}
