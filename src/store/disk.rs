use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

const HEADER_LEN: usize = 8;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Entries are an 8-byte big-endian expiry in unix millis (0 = never)
/// followed by the value.
fn encode_entry(value: &[u8], ttl: Option<Duration>) -> Vec<u8> {
    let expires_at = ttl.map_or(0, |d| now_millis().saturating_add(d.as_millis() as u64).max(1));
    let mut entry = Vec::with_capacity(HEADER_LEN + value.len());
    entry.extend_from_slice(&expires_at.to_be_bytes());
    entry.extend_from_slice(value);
    entry
}

/// Returns the value unless the entry is expired or malformed.
fn decode_entry(entry: &[u8]) -> Option<&[u8]> {
    let (header, value) = entry.split_at_checked(HEADER_LEN)?;
    let expires_at = u64::from_be_bytes(header.try_into().ok()?);
    (expires_at == 0 || expires_at > now_millis()).then_some(value)
}

/// Collection backed by a fjall partition, surviving process restarts.
pub struct DiskCollection {
    partition: PartitionHandle,
    _keyspace: Arc<Keyspace>,
}

impl DiskCollection {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle) -> Self {
        Self {
            partition,
            _keyspace: keyspace,
        }
    }

    fn try_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.partition.get(key)? else {
            debug!("Cache MISS");
            return Ok(None);
        };
        match decode_entry(&entry) {
            Some(value) => {
                debug!("Cache HIT");
                Ok(Some(value.to_vec()))
            }
            None => {
                debug!("Cache entry expired");
                self.partition.remove(key)?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.try_get(key).unwrap_or_else(|e| {
            debug!("DiskCollection get error: {}", e);
            None
        })
    }

    async fn put(&self, key: &[u8], value: Vec<u8>, ttl: Option<Duration>) {
        match self.partition.insert(key, encode_entry(&value, ttl)) {
            Ok(()) => debug!("Cache PUT"),
            Err(e) => debug!("DiskCollection put error: {}", e),
        }
    }

    async fn remove(&self, key: &[u8]) {
        if let Err(e) = self.partition.remove(key) {
            debug!("DiskCollection remove error: {}", e);
        }
    }
}
