/// Identity Mapping System
///
/// Maintains the user-level association between linked identifiers (LIDs)
/// and phone-number identifiers (PNs), with directory fallback for PN -> LID
/// lookups.

pub mod logger;
pub mod mapping;
pub mod resolver;

pub use logger::{MappingLogger, TracingLogger};
pub use mapping::{LidMappingStore, LidPnPair, MappingBatch, LID_MAPPING_CATEGORY};
pub use resolver::{DirectoryEntry, DirectoryResolver, StaticDirectory};
