pub mod disk;
pub mod memory;
pub mod report;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, warn};

/// A thread-safe key-value store that can hold multiple collections.
///
/// Persistent collections live in a fjall keyspace under the data directory;
/// when that cannot be opened only in-memory collections are available.
pub struct KeyValueStore {
    collections: RwLock<HashMap<(String, bool), Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Arc<Keyspace>>,
}

impl KeyValueStore {
    pub fn open(data_path: &Path) -> Self {
        let cache_dir = data_path.join("cache");
        let keyspace = match fjall::Config::new(&cache_dir).open() {
            Ok(keyspace) => Some(Arc::new(keyspace)),
            Err(e) => {
                warn!(path = %cache_dir.display(), error = %e, "Persistent cache unavailable");
                None
            }
        };

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }

    fn create_collection(&self, name: &str, persist: bool) -> Option<Arc<dyn KeyValueCollection>> {
        if !persist {
            return Some(Arc::new(MemoryCollection::new()));
        }
        let keyspace = self.keyspace.as_ref()?;
        match keyspace.open_partition(name, PartitionCreateOptions::default()) {
            Ok(partition) => Some(Arc::new(DiskCollection::new(
                Arc::clone(keyspace),
                partition,
            ))),
            Err(e) => {
                warn!(collection = name, error = %e, "Failed to open persistent collection");
                None
            }
        }
    }
}

impl Default for KeyValueStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store for KeyValueStore {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>> {
        let key = (name.to_string(), persist);
        if let Some(existing) = self
            .collections
            .read()
            .ok()
            .and_then(|collections| collections.get(&key).cloned())
        {
            return Some(existing);
        }
        if !create_if_missing {
            return None;
        }

        let mut collections = self.collections.write().ok()?;
        if let Some(existing) = collections.get(&key) {
            return Some(Arc::clone(existing));
        }
        let collection = self.create_collection(name, persist)?;
        debug!(collection = name, persist, "Created collection");
        collections.insert(key, Arc::clone(&collection));
        Some(collection)
    }
}
