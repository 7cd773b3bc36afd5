//! User-level identity mapping between linked identifiers (LIDs) and
//! phone-number identifiers (PNs) for multi-device messaging.
//!
//! Mappings are stored once per user in a categorised key-value store. Every
//! lookup rebuilds a device-specific identifier from the device index of the
//! identifier passed in, so device indices never reach storage.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod jid;
pub mod keystore;

pub use config::MappingConfig;
pub use error::{MappingError, MappingResult};
pub use identity::{
    DirectoryEntry, DirectoryResolver, LidMappingStore, LidPnPair, MappingLogger, StaticDirectory,
    TracingLogger,
};
pub use jid::{Jid, Namespace};
pub use keystore::{KeyValueStore, MemoryKeyStore, SqliteKeyStore};
