//! SQLite-backed collection transport.
//!
//! The file-backed tier is the default; this backend exists as the larger
//! durable tier to move to when [`StorageError::QuotaExceeded`] starts
//! surfacing. Collections are stored as whole payloads in a single
//! `collections(name, payload)` table, so the store contract is identical
//! across backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{CollectionStore, StorageError, Store};

mod migrate;

/// SQLite error code raised when the database is full.
const SQLITE_FULL: &str = "13";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or
    /// the setup PRAGMAs fail.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the collections table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

fn map_sqlx(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(SQLITE_FULL) {
            return StorageError::QuotaExceeded;
        }
    }
    StorageError::Io(err.to_string())
}

#[async_trait]
impl CollectionStore for SqliteBackend {
    async fn get(&self, collection: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar::<_, String>("SELECT payload FROM collections WHERE name = ?1")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn set(&self, collection: &str, payload: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO collections (name, payload)
                VALUES (?1, ?2)
                ON CONFLICT(name) DO UPDATE SET payload = excluded.payload
            ",
        )
        .bind(collection)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn remove(&self, collection: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

impl Store {
    /// Store backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let backend = SqliteBackend::connect(database_url).await?;
        backend.migrate().await?;
        Ok(Self::new(Arc::new(backend)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteBackend>();
    }
}
