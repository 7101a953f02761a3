//! Key-value storage abstractions used for short-lived response caching.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A named set of byte entries with optional expiry.
///
/// Expired entries read as missing. Storage errors are logged by the
/// implementation and never surfaced: a cache that fails behaves as empty.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: Vec<u8>, ttl: Option<Duration>);
    async fn remove(&self, key: &[u8]);
}

pub trait Store: Send + Sync {
    /// Looks up `name`, creating it when `create_if_missing` is set.
    ///
    /// `persist` selects on-disk storage over memory. `None` when a persistent
    /// collection cannot be opened.
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}
