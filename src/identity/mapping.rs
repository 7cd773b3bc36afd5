/// LID <-> PN mapping store
///
/// Mappings are persisted at user granularity only. Every lookup rebuilds a
/// device-specific identifier from the device index of the identifier it was
/// given.
use crate::{
    error::{MappingError, MappingResult},
    identity::{DirectoryResolver, MappingLogger, TracingLogger},
    jid::{is_lid_user, is_pn_user, Jid},
    keystore::{category_writes, transaction_body, KeyValueStore},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key store category holding forward and reverse entries
pub const LID_MAPPING_CATEGORY: &str = "lid-mapping";

const REVERSE_SUFFIX: &str = "_reverse";

/// Key of the reverse (LID user -> PN user) entry
pub fn reverse_key(lid_user: &str) -> String {
    format!("{}{}", lid_user, REVERSE_SUFFIX)
}

fn is_user_part(value: &str) -> bool {
    !value.is_empty() && !value.contains(['@', ':'])
}

/// Candidate association between a LID and a PN
///
/// The field names are a hint only: roles are decided by namespace, so a
/// pair with the two identifiers swapped is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LidPnPair {
    pub lid: String,
    pub pn: String,
}

impl LidPnPair {
    pub fn new(lid: impl Into<String>, pn: impl Into<String>) -> Self {
        Self {
            lid: lid.into(),
            pn: pn.into(),
        }
    }
}

/// Validated, deduplicated set of user-level mappings (PN user -> LID user)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingBatch {
    entries: BTreeMap<String, String>,
}

impl MappingBatch {
    /// Validate and accumulate pairs
    ///
    /// Pairs that are not exactly one LID user plus one PN user are logged
    /// and skipped. If an accepted pair fails to decode, the whole batch is
    /// abandoned and `None` is returned. Later pairs win for a repeated PN user.
    pub fn from_pairs(pairs: &[LidPnPair], logger: &dyn MappingLogger) -> Option<Self> {
        let mut entries = BTreeMap::new();

        for LidPnPair { lid, pn } in pairs {
            let (lid_jid, pn_jid) = if is_lid_user(lid) && is_pn_user(pn) {
                (lid, pn)
            } else if is_pn_user(lid) && is_lid_user(pn) {
                (pn, lid)
            } else {
                logger.warn(format_args!("Invalid LID-PN mapping: {}, {}", lid, pn));
                continue;
            };

            let lid_decoded = Jid::decode(lid_jid)?;
            let pn_decoded = Jid::decode(pn_jid)?;

            entries.insert(pn_decoded.user().to_string(), lid_decoded.user().to_string());
        }

        Some(Self { entries })
    }

    /// Batch holding one already-decoded user pair
    pub fn single(pn_user: impl Into<String>, lid_user: impl Into<String>) -> Self {
        Self {
            entries: BTreeMap::from([(pn_user.into(), lid_user.into())]),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(pn_user, lid_user)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(pn, lid)| (pn.as_str(), lid.as_str()))
    }

    /// Write the batch in one transaction, one store write per pair
    /// carrying both its forward and reverse entry.
    pub async fn commit(&self, keys: &dyn KeyValueStore) -> MappingResult<()> {
        let batch = self;

        keys.transaction(
            LID_MAPPING_CATEGORY,
            transaction_body(move |writer| async move {
                for (pn_user, lid_user) in batch.iter() {
                    let entries = [
                        (pn_user.to_string(), lid_user.to_string()),
                        (reverse_key(lid_user), pn_user.to_string()),
                    ];
                    writer.set(category_writes(LID_MAPPING_CATEGORY, entries)).await?;
                }
                Ok::<(), MappingError>(())
            }),
        )
        .await
    }
}

/// User-level LID <-> PN mapping store
#[derive(Clone)]
pub struct LidMappingStore {
    keys: Arc<dyn KeyValueStore>,
    resolver: Option<Arc<dyn DirectoryResolver>>,
    logger: Arc<dyn MappingLogger>,
}

impl LidMappingStore {
    /// Create a mapping store
    ///
    /// Without a resolver, PN -> LID lookups are answered from the key store only.
    pub fn new(keys: Arc<dyn KeyValueStore>, resolver: Option<Arc<dyn DirectoryResolver>>) -> Self {
        Self {
            keys,
            resolver,
            logger: Arc::new(TracingLogger),
        }
    }

    /// Replace the diagnostics sink
    pub fn with_logger(mut self, logger: Arc<dyn MappingLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Store one LID-PN mapping (user level)
    pub async fn store_mapping(&self, lid: &str, pn: &str) -> MappingResult<()> {
        self.store_mappings(&[LidPnPair::new(lid, pn)]).await
    }

    /// Store LID-PN mappings (user level)
    ///
    /// Invalid pairs are skipped; an undecodable pair abandons the call
    /// without writing anything. Store failures propagate.
    pub async fn store_mappings(&self, pairs: &[LidPnPair]) -> MappingResult<()> {
        let Some(batch) = MappingBatch::from_pairs(pairs, self.logger.as_ref()) else {
            return Ok(());
        };

        self.logger.trace(format_args!(
            "Storing {} pn mappings: {:?}",
            batch.len(),
            batch.entries
        ));

        batch.commit(self.keys.as_ref()).await
    }

    /// Get the device-specific LID for a PN
    ///
    /// Falls back to the directory resolver when no mapping is stored. The
    /// returned LID carries the device index of `pn` (0 when absent).
    pub async fn get_lid_for_pn(&self, pn: &str) -> MappingResult<Option<Jid>> {
        if !is_pn_user(pn) {
            return Ok(None);
        }
        let Some(decoded) = Jid::decode(pn) else {
            return Ok(None);
        };

        let pn_user = decoded.user();
        let mut stored = self
            .keys
            .get(LID_MAPPING_CATEGORY, &[pn_user.to_string()])
            .await?;

        let lid_user = match stored.remove(pn_user).filter(|user| !user.is_empty()) {
            Some(user) => user,
            None => {
                self.logger.trace(format_args!(
                    "No LID mapping found for PN user {}; querying directory",
                    pn_user
                ));
                match self.resolve_lid_user(pn).await? {
                    Some(user) => user,
                    None => return Ok(None),
                }
            }
        };

        if !is_user_part(&lid_user) {
            return Ok(None);
        }

        let pn_device = decoded.device_or_primary();
        let lid = Jid::lid(lid_user, pn_device);
        self.logger.trace(format_args!(
            "Resolved LID {} -> {} (user mapping with device {})",
            pn, lid, pn_device
        ));

        Ok(Some(lid))
    }

    /// Get the device-specific PN for a LID
    ///
    /// Answered from stored mappings only; the directory is never consulted.
    pub async fn get_pn_for_lid(&self, lid: &str) -> MappingResult<Option<Jid>> {
        if !is_lid_user(lid) {
            return Ok(None);
        }
        let Some(decoded) = Jid::decode(lid) else {
            return Ok(None);
        };

        let key = reverse_key(decoded.user());
        let mut stored = self
            .keys
            .get(LID_MAPPING_CATEGORY, std::slice::from_ref(&key))
            .await?;

        let pn_user = match stored.remove(&key).filter(|user| is_user_part(user)) {
            Some(user) => user,
            None => {
                self.logger.trace(format_args!(
                    "No reverse mapping found for LID user: {}",
                    decoded.user()
                ));
                return Ok(None);
            }
        };

        let pn = Jid::pn(pn_user, decoded.device_or_primary());
        self.logger
            .trace(format_args!("Found reverse mapping: {} -> {}", lid, pn));

        Ok(Some(pn))
    }

    /// Ask the directory for the LID user of a PN
    async fn resolve_lid_user(&self, pn: &str) -> MappingResult<Option<String>> {
        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };

        let Some(entry) = resolver.on_whatsapp(pn).await?.into_iter().next() else {
            return Ok(None);
        };

        if !entry.exists {
            return Ok(None);
        }

        Ok(entry
            .lid
            .as_deref()
            .and_then(Jid::decode)
            .map(|lid| lid.user().to_string()))
    }
}
