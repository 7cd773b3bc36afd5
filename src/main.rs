/// lid-mapping - inspect and edit the LID <-> PN mapping of a key store
///
/// Usage:
///   lid-mapping store <lid> <pn>
///   lid-mapping lid <pn>
///   lid-mapping pn <lid>
use lid_mapping::jid::is_lid_user;
use lid_mapping::{LidMappingStore, MappingConfig, MappingError, MappingResult, SqliteKeyStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> MappingResult<()> {
    let config = MappingConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();

    let keys = Arc::new(SqliteKeyStore::open(&config.storage).await?);
    let store = LidMappingStore::new(keys, None);

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["store", lid, pn] => {
            store.store_mapping(lid, pn).await?;

            // Invalid pairs are skipped silently, so report what was kept
            let lid_side = if is_lid_user(lid) { lid } else { pn };
            match store.get_pn_for_lid(lid_side).await? {
                Some(stored) => println!("{} -> {}", lid_side, stored),
                None => println!("nothing stored for {}, {}", lid, pn),
            }
        }
        ["lid", pn] => match store.get_lid_for_pn(pn).await? {
            Some(lid) => println!("{}", lid),
            None => println!("no mapping for {}", pn),
        },
        ["pn", lid] => match store.get_pn_for_lid(lid).await? {
            Some(pn) => println!("{}", pn),
            None => println!("no mapping for {}", lid),
        },
        _ => {
            return Err(MappingError::Config(
                "usage: lid-mapping store <lid> <pn> | lid <pn> | pn <lid>".to_string(),
            ));
        }
    }

    Ok(())
}
