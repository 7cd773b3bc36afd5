/// Configuration management for the LID mapping store
use crate::error::{MappingError, MappingResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub enable_wal: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `lid_mapping=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                database_path: PathBuf::from("./data/keys.sqlite"),
                max_connections: 5,
                enable_wal: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

impl MappingConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MappingResult<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let database_path = env::var("LID_MAPPING_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.database_path);
        let max_connections = match env::var("LID_MAPPING_DB_MAX_CONNECTIONS") {
            Ok(value) => value.parse().map_err(|_| {
                MappingError::Config(format!("Invalid max connection count: {}", value))
            })?,
            Err(_) => defaults.storage.max_connections,
        };
        let enable_wal = env::var("LID_MAPPING_DB_WAL")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let level = env::var("RUST_LOG").unwrap_or(defaults.logging.level);
        let json = env::var("LID_MAPPING_LOG_JSON")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let config = MappingConfig {
            storage: StorageConfig {
                database_path,
                max_connections,
                enable_wal,
            },
            logging: LoggingConfig { level, json },
        };
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> MappingResult<()> {
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(MappingError::Config(
                "Database path cannot be empty".to_string(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(MappingError::Config(
                "At least one database connection is required".to_string(),
            ));
        }

        Ok(())
    }
}
