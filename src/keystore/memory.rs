/// In-memory key store
use crate::{
    error::{MappingError, MappingResult},
    keystore::{KeyValueStore, KeyWriter, KeyWrites, TransactionBody},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type Categories = HashMap<String, HashMap<String, String>>;

/// Process-local key store
///
/// Transaction writes are staged on the transaction's own writer and applied
/// in one step when the body succeeds.
#[derive(Default)]
pub struct MemoryKeyStore {
    data: RwLock<Categories>,
    tx_lock: Mutex<()>,
}

impl MemoryKeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every committed entry in a category
    pub async fn entries(&self, category: &str) -> HashMap<String, String> {
        self.data
            .read()
            .await
            .get(category)
            .cloned()
            .unwrap_or_default()
    }
}

fn apply(data: &mut Categories, writes: KeyWrites) {
    for (category, entries) in writes {
        let bucket = data.entry(category).or_default();
        for (key, value) in entries {
            match value {
                Some(value) => {
                    bucket.insert(key, value);
                }
                None => {
                    bucket.remove(&key);
                }
            }
        }
    }
}

/// Writer of one open in-memory transaction
struct MemoryTransaction<'a> {
    store: &'a MemoryKeyStore,
    /// `None` once the transaction has finished
    staged: StdMutex<Option<KeyWrites>>,
}

impl MemoryTransaction<'_> {
    fn finish(&self) -> Option<KeyWrites> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

fn closed() -> MappingError {
    MappingError::Store("Transaction already finished".to_string())
}

#[async_trait]
impl KeyWriter for MemoryTransaction<'_> {
    async fn get(&self, category: &str, keys: &[String]) -> MappingResult<HashMap<String, String>> {
        let data = self.store.data.read().await;
        let committed = data.get(category);
        let staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = staged.as_ref().ok_or_else(closed)?.get(category);

        let mut found = HashMap::new();
        for key in keys {
            let value = match pending.and_then(|p| p.get(key)) {
                Some(staged_value) => staged_value.clone(),
                None => committed.and_then(|c| c.get(key)).cloned(),
            };
            if let Some(value) = value {
                found.insert(key.clone(), value);
            }
        }

        Ok(found)
    }

    async fn set(&self, writes: KeyWrites) -> MappingResult<()> {
        let mut staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = staged.as_mut().ok_or_else(closed)?;
        for (category, entries) in writes {
            pending.entry(category).or_default().extend(entries);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyStore {
    async fn get(&self, category: &str, keys: &[String]) -> MappingResult<HashMap<String, String>> {
        let data = self.data.read().await;
        let Some(committed) = data.get(category) else {
            return Ok(HashMap::new());
        };

        Ok(keys
            .iter()
            .filter_map(|key| committed.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn set(&self, writes: KeyWrites) -> MappingResult<()> {
        let _serial = self.tx_lock.lock().await;
        apply(&mut *self.data.write().await, writes);
        Ok(())
    }

    async fn transaction<'a>(
        &'a self,
        label: &'a str,
        body: TransactionBody<'a>,
    ) -> MappingResult<()> {
        let _serial = self.tx_lock.lock().await;

        let txn = Arc::new(MemoryTransaction {
            store: self,
            staged: StdMutex::new(Some(KeyWrites::new())),
        });
        let writer: Arc<dyn KeyWriter + 'a> = txn.clone();

        let result = body(writer).await;
        let staged = txn.finish();

        match result {
            Ok(()) => {
                if let Some(writes) = staged {
                    apply(&mut *self.data.write().await, writes);
                }
                debug!(label, "Committed in-memory transaction");
                Ok(())
            }
            Err(e) => {
                debug!(label, error = %e, "Discarded in-memory transaction");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{category_writes, transaction_body};
    use tokio::sync::oneshot;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryKeyStore::new();
        store
            .set(category_writes("session", [("alice", "1"), ("bob", "2")]))
            .await
            .unwrap();

        let found = store.get("session", &keys(&["alice", "carol"])).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("alice"), Some(&"1".to_string()));
    }

    #[tokio::test]
    async fn test_none_deletes() {
        let store = MemoryKeyStore::new();
        store.set(category_writes("session", [("alice", "1")])).await.unwrap();

        let delete = HashMap::from([(
            "session".to_string(),
            HashMap::from([("alice".to_string(), None)]),
        )]);
        store.set(delete).await.unwrap();

        assert!(store.entries("session").await.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_commits_together() {
        let store = MemoryKeyStore::new();
        let reader = &store;

        store
            .transaction(
                "batch",
                transaction_body(move |writer| async move {
                    writer.set(category_writes("c", [("a", "1")])).await?;
                    // Staged writes are readable through the writer only
                    let seen = writer.get("c", &keys(&["a"])).await?;
                    assert_eq!(seen.get("a"), Some(&"1".to_string()));
                    assert!(reader.get("c", &keys(&["a"])).await?.is_empty());
                    writer.set(category_writes("c", [("b", "2")])).await
                }),
            )
            .await
            .unwrap();

        assert_eq!(store.entries("c").await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_transaction_discards_writes() {
        let store = MemoryKeyStore::new();

        let result = store
            .transaction(
                "batch",
                transaction_body(|writer| async move {
                    writer.set(category_writes("c", [("a", "1")])).await?;
                    Err::<(), _>(MappingError::Store("disk full".to_string()))
                }),
            )
            .await;

        assert!(matches!(result, Err(MappingError::Store(_))));
        assert!(store.entries("c").await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_isolated_from_rollback() {
        let store = Arc::new(MemoryKeyStore::new());
        let (opened_tx, opened_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let txn = tokio::spawn({
            let store = store.clone();
            async move {
                store
                    .transaction(
                        "lid-mapping",
                        transaction_body(move |writer| async move {
                            writer
                                .set(category_writes("lid-mapping", [("123456", "99999")]))
                                .await?;
                            let _ = opened_tx.send(());
                            let _ = release_rx.await;
                            Err::<(), _>(MappingError::Store("aborted".to_string()))
                        }),
                    )
                    .await
            }
        });
        opened_rx.await.unwrap();

        // No dirty read while the transaction is open
        let seen = store.get("lid-mapping", &keys(&["123456"])).await.unwrap();
        assert!(seen.is_empty());

        // An independent write waits for the transaction instead of joining it
        let independent = tokio::spawn({
            let store = store.clone();
            async move { store.set(category_writes("other", [("k", "v")])).await }
        });
        release_tx.send(()).unwrap();

        assert!(txn.await.unwrap().is_err());
        independent.await.unwrap().unwrap();

        assert!(store.entries("lid-mapping").await.is_empty());
        assert_eq!(store.entries("other").await.get("k"), Some(&"v".to_string()));
    }

    #[tokio::test]
    async fn test_writer_rejects_use_after_finish() {
        let store = MemoryKeyStore::new();
        let (leak_tx, leak_rx) = oneshot::channel();

        store
            .transaction(
                "batch",
                transaction_body(move |writer| {
                    let _ = leak_tx.send(writer);
                    async { Ok::<(), MappingError>(()) }
                }),
            )
            .await
            .unwrap();

        let writer = leak_rx.await.unwrap();
        let result = writer.set(category_writes("c", [("a", "1")])).await;
        assert!(matches!(result, Err(MappingError::Store(_))));
        assert!(store.entries("c").await.is_empty());
    }
}
