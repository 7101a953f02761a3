pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::holdings::HoldingsOptions;
use crate::core::cache::Store;
use crate::core::config::AppConfig;
use crate::providers::ProviderRouter;
use crate::store::KeyValueStore;
use crate::store::report::{COLLECTION_NAME, ReportCache};
use anyhow::Result;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Holdings(HoldingsOptions),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("chainfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    config.validate()?;

    let provider = ProviderRouter::from_config(&config)?;

    match command {
        AppCommand::Holdings(options) => {
            let cache = if options.no_cache {
                None
            } else {
                open_report_cache(&config)
            };
            cli::holdings::run(&config, &provider, cache.as_ref(), &options).await
        }
    }
}

/// Opens the report cache, falling back to memory when the disk store is unavailable.
fn open_report_cache(config: &AppConfig) -> Option<ReportCache> {
    if config.cache.ttl_secs == 0 {
        return None;
    }

    let store = if config.cache.persist {
        match config.default_data_path() {
            Ok(path) => KeyValueStore::open(&path),
            Err(e) => {
                warn!(error = %e, "No data directory, caching in memory only");
                KeyValueStore::in_memory()
            }
        }
    } else {
        KeyValueStore::in_memory()
    };

    let collection = store
        .get_collection(COLLECTION_NAME, config.cache.persist, true)
        .or_else(|| store.get_collection(COLLECTION_NAME, false, true))?;
    match ReportCache::new(collection, config.cache.ttl()).scoped(&config.chain_sources()) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(error = %e, "Report cache disabled");
            None
        }
    }
}
