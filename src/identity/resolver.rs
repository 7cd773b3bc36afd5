/// Directory resolution - answers "is this phone number an account, and
/// what is its LID" when no mapping is stored yet
use crate::{
    error::MappingResult,
    identity::MappingBatch,
    jid::Jid,
    keystore::KeyValueStore,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One directory answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub exists: bool,
    /// LID identifier of the account, when known
    pub lid: Option<String>,
}

/// External directory queried on PN -> LID cache misses
///
/// Implementations are expected to persist any mapping they discover, so a
/// later lookup is answered from the key store.
#[async_trait]
pub trait DirectoryResolver: Send + Sync {
    /// Look up a phone-number identifier
    async fn on_whatsapp(&self, pn: &str) -> MappingResult<Vec<DirectoryEntry>>;
}

/// Fixed, in-process directory
///
/// Useful for tests and offline tooling. When given a key store it records
/// every mapping it hands out, like the network directory query does.
#[derive(Default)]
pub struct StaticDirectory {
    /// PN user -> LID identifier
    accounts: HashMap<String, String>,
    keys: Option<Arc<dyn KeyValueStore>>,
    lookups: AtomicUsize,
}

impl StaticDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account
    pub fn with_account(mut self, pn_user: impl Into<String>, lid: impl Into<String>) -> Self {
        self.accounts.insert(pn_user.into(), lid.into());
        self
    }

    /// Persist resolved mappings into `keys`
    pub fn persisting_to(mut self, keys: Arc<dyn KeyValueStore>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Number of queries answered so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryResolver for StaticDirectory {
    async fn on_whatsapp(&self, pn: &str) -> MappingResult<Vec<DirectoryEntry>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let Some(pn_user) = Jid::decode(pn).map(|jid| jid.user().to_string()) else {
            return Ok(Vec::new());
        };

        let Some(lid) = self.accounts.get(&pn_user) else {
            debug!(pn = %pn, "Directory has no account");
            return Ok(vec![DirectoryEntry {
                exists: false,
                lid: None,
            }]);
        };

        if let (Some(keys), Some(lid_jid)) = (&self.keys, Jid::decode(lid)) {
            MappingBatch::single(pn_user.as_str(), lid_jid.user())
                .commit(keys.as_ref())
                .await?;
        }

        Ok(vec![DirectoryEntry {
            exists: true,
            lid: Some(lid.clone()),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LID_MAPPING_CATEGORY;
    use crate::keystore::MemoryKeyStore;

    #[tokio::test]
    async fn test_known_account() {
        let directory = StaticDirectory::new().with_account("123456", "99999@lid");

        let entries = directory.on_whatsapp("123456:2@s.whatsapp.net").await.unwrap();

        assert_eq!(
            entries,
            vec![DirectoryEntry {
                exists: true,
                lid: Some("99999@lid".to_string()),
            }]
        );
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let directory = StaticDirectory::new();

        let entries = directory.on_whatsapp("123456@s.whatsapp.net").await.unwrap();

        assert_eq!(entries.len(), 1);
        assert!(!entries[0].exists);
    }

    #[tokio::test]
    async fn test_undecodable_query_has_no_answer() {
        let directory = StaticDirectory::new();

        assert!(directory.on_whatsapp("not-a-jid").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_resolved_mapping() {
        let keys = Arc::new(MemoryKeyStore::new());
        let directory = StaticDirectory::new()
            .with_account("123456", "99999:1@lid")
            .persisting_to(keys.clone());

        directory.on_whatsapp("123456@s.whatsapp.net").await.unwrap();

        let entries = keys.entries(LID_MAPPING_CATEGORY).await;
        assert_eq!(entries.get("123456"), Some(&"99999".to_string()));
        assert_eq!(entries.get("99999_reverse"), Some(&"123456".to_string()));
    }

    #[test]
    fn test_entry_deserializes_from_usync_json() {
        let entry: DirectoryEntry =
            serde_json::from_str(r#"{"exists":true,"lid":"99999@lid"}"#).unwrap();
        assert!(entry.exists);
        assert_eq!(entry.lid.as_deref(), Some("99999@lid"));

        let missing: DirectoryEntry = serde_json::from_str(r#"{"exists":false}"#).unwrap();
        assert_eq!(missing.lid, None);
    }
}
