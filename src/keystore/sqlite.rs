/// SQLite key store - persists categorised entries in the `key_value` table
use crate::{
    config::StorageConfig,
    db::{self, DatabaseOptions},
    error::{MappingError, MappingResult},
    keystore::{KeyValueStore, KeyWriter, KeyWrites, TransactionBody},
};
use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// SQLite-backed key store
///
/// Only the writer handed to a transaction body touches the open database
/// transaction; everyone else reads committed rows. Writes are serialised.
/// Dropping an unfinished transaction rolls it back.
pub struct SqliteKeyStore {
    db: SqlitePool,
    tx_lock: Mutex<()>,
}

impl SqliteKeyStore {
    /// Create a key store over a migrated pool
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            tx_lock: Mutex::new(()),
        }
    }

    /// Open (and migrate) the database described by `config`
    pub async fn open(config: &StorageConfig) -> MappingResult<Self> {
        let pool = db::create_pool(
            &config.database_path,
            DatabaseOptions {
                max_connections: config.max_connections,
                enable_wal: config.enable_wal,
            },
        )
        .await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        info!(path = %config.database_path.display(), "Opened key store");

        Ok(Self::new(pool))
    }

    /// Number of entries stored in a category
    pub async fn count(&self, category: &str) -> MappingResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM key_value WHERE category = ?1")
            .bind(category)
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}

async fn write_entries(tx: &mut Transaction<'static, Sqlite>, writes: &KeyWrites) -> MappingResult<()> {
    for (category, entries) in writes {
        for (key, value) in entries {
            match value {
                Some(value) => {
                    sqlx::query(
                        r#"
                        INSERT INTO key_value (category, key, value, updated_at)
                        VALUES (?1, ?2, ?3, datetime('now'))
                        ON CONFLICT(category, key) DO UPDATE SET
                            value = excluded.value,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(category)
                    .bind(key)
                    .bind(value)
                    .execute(&mut **tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM key_value WHERE category = ?1 AND key = ?2")
                        .bind(category)
                        .bind(key)
                        .execute(&mut **tx)
                        .await?;
                }
            }
        }
    }

    Ok(())
}

/// Writer of one open database transaction
struct SqliteTransaction {
    /// `None` once the transaction has been committed or rolled back
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

fn closed() -> MappingError {
    MappingError::Store("Transaction already finished".to_string())
}

#[async_trait]
impl KeyWriter for SqliteTransaction {
    async fn get(&self, category: &str, keys: &[String]) -> MappingResult<HashMap<String, String>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let mut found = HashMap::new();

        for key in keys {
            let row = sqlx::query("SELECT value FROM key_value WHERE category = ?1 AND key = ?2")
                .bind(category)
                .bind(key)
                .fetch_optional(&mut **tx)
                .await?;

            if let Some(row) = row {
                found.insert(key.clone(), row.try_get("value")?);
            }
        }

        Ok(found)
    }

    async fn set(&self, writes: KeyWrites) -> MappingResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        write_entries(tx, &writes).await
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyStore {
    async fn get(&self, category: &str, keys: &[String]) -> MappingResult<HashMap<String, String>> {
        let mut found = HashMap::new();

        for key in keys {
            let row = sqlx::query("SELECT value FROM key_value WHERE category = ?1 AND key = ?2")
                .bind(category)
                .bind(key)
                .fetch_optional(&self.db)
                .await?;

            if let Some(row) = row {
                found.insert(key.clone(), row.try_get("value")?);
            }
        }

        Ok(found)
    }

    async fn set(&self, writes: KeyWrites) -> MappingResult<()> {
        let _serial = self.tx_lock.lock().await;

        let mut tx = self.db.begin().await?;
        write_entries(&mut tx, &writes).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn transaction<'a>(
        &'a self,
        label: &'a str,
        body: TransactionBody<'a>,
    ) -> MappingResult<()> {
        let _serial = self.tx_lock.lock().await;

        let txn = Arc::new(SqliteTransaction {
            tx: Mutex::new(Some(self.db.begin().await?)),
        });
        debug!(label, "Opened key store transaction");

        let writer: Arc<dyn KeyWriter + 'a> = txn.clone();
        let result = body(writer).await;

        let tx = txn.tx.lock().await.take().ok_or_else(closed)?;

        match result {
            Ok(()) => {
                tx.commit().await?;
                debug!(label, "Committed key store transaction");
                Ok(())
            }
            Err(e) => {
                warn!(label, error = %e, "Rolling back key store transaction");
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}
