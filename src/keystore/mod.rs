/// Categorised key-value storage
///
/// The mapping store persists through any backend implementing
/// [`KeyValueStore`]. Values are plain strings grouped under a category name.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKeyStore;
pub use sqlite::SqliteKeyStore;

use crate::error::MappingResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Writes for one category: key -> new value, `None` deletes the key
pub type CategoryWrites = HashMap<String, Option<String>>;

/// Writes across categories
pub type KeyWrites = HashMap<String, CategoryWrites>;

/// Handle to an open transaction
///
/// Reads see the transaction's own writes on top of committed state. Once the
/// transaction has finished, every call fails with [`MappingError::Store`].
///
/// [`MappingError::Store`]: crate::error::MappingError::Store
#[async_trait]
pub trait KeyWriter: Send + Sync {
    async fn get(&self, category: &str, keys: &[String]) -> MappingResult<HashMap<String, String>>;

    async fn set(&self, writes: KeyWrites) -> MappingResult<()>;
}

/// Body of a transaction, handed the writer it must issue its writes through
pub type TransactionBody<'a> =
    Box<dyn FnOnce(Arc<dyn KeyWriter + 'a>) -> BoxFuture<'a, MappingResult<()>> + Send + 'a>;

/// Box a closure as a [`TransactionBody`]
pub fn transaction_body<'a, F, Fut>(f: F) -> TransactionBody<'a>
where
    F: FnOnce(Arc<dyn KeyWriter + 'a>) -> Fut + Send + 'a,
    Fut: Future<Output = MappingResult<()>> + Send + 'a,
{
    Box::new(move |writer| -> BoxFuture<'a, MappingResult<()>> { Box::pin(f(writer)) })
}

/// Transactional key-value backend
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys of a category from committed state
    ///
    /// Keys with no stored value are absent from the returned map.
    async fn get(&self, category: &str, keys: &[String]) -> MappingResult<HashMap<String, String>>;

    /// Apply a batch of writes atomically, outside any transaction
    ///
    /// Waits for an open transaction to finish first.
    async fn set(&self, writes: KeyWrites) -> MappingResult<()>;

    /// Run `body` so that every write it issues through its [`KeyWriter`]
    /// becomes visible together, or not at all if `body` (or the commit)
    /// fails. Readers outside the body never see uncommitted writes.
    ///
    /// Transactions are serialised and not reentrant: calling `set` or
    /// `transaction` on the store from inside `body` waits forever.
    async fn transaction<'a>(
        &'a self,
        label: &'a str,
        body: TransactionBody<'a>,
    ) -> MappingResult<()>;
}

/// Build a single-category write set
pub fn category_writes<I, K, V>(category: &str, entries: I) -> KeyWrites
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let writes = entries
        .into_iter()
        .map(|(key, value)| (key.into(), Some(value.into())))
        .collect();

    HashMap::from([(category.to_string(), writes)])
}
