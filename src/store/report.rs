//! Short-lived memoization of holdings reports.
use crate::core::cache::KeyValueCollection;
use crate::core::holdings::{HoldingsReport, TrackingConfig};
use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const COLLECTION_NAME: &str = "holdings";

/// Caches reports keyed by the exact tracking parameters for a fixed TTL.
///
/// A cached report is returned as-is; callers treat it exactly like a
/// freshly built one. Reports with failed chains are never stored so a
/// transient provider outage does not outlive the request that saw it.
pub struct ReportCache {
    collection: Arc<dyn KeyValueCollection>,
    ttl: Duration,
    scope: Vec<u8>,
}

impl ReportCache {
    pub fn new(collection: Arc<dyn KeyValueCollection>, ttl: Duration) -> Self {
        Self {
            collection,
            ttl,
            scope: Vec::new(),
        }
    }

    /// Scopes every key by `sources`, so reports built from another
    /// provider setup are never served.
    pub fn scoped<S: Serialize>(mut self, sources: &S) -> serde_json::Result<Self> {
        self.scope = serde_json::to_vec(sources)?;
        Ok(self)
    }

    fn key(&self, tracking: &TrackingConfig) -> serde_json::Result<Vec<u8>> {
        let mut key = b"holdings:".to_vec();
        key.extend_from_slice(&self.scope);
        key.push(b':');
        key.extend(serde_json::to_vec(tracking)?);
        Ok(key)
    }

    pub async fn get(&self, tracking: &TrackingConfig) -> Option<HoldingsReport> {
        let key = self.key(tracking).ok()?;
        let bytes = self.collection.get(&key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(report) => Some(report),
            Err(e) => {
                debug!("Discarding undecodable cached report: {}", e);
                self.collection.remove(&key).await;
                None
            }
        }
    }

    pub async fn put(&self, tracking: &TrackingConfig, report: &HoldingsReport) {
        if self.ttl.is_zero() || !report.failures().is_empty() {
            return;
        }
        match (self.key(tracking), serde_json::to_vec(report)) {
            (Ok(key), Ok(value)) => self.collection.put(&key, value, Some(self.ttl)).await,
            (Err(e), _) | (_, Err(e)) => debug!("Skipping report cache write: {}", e),
        }
    }

    /// Returns the cached report for `tracking`, or builds and caches one.
    pub async fn get_or_build<F, Fut>(
        &self,
        tracking: &TrackingConfig,
        build: F,
    ) -> Result<HoldingsReport>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HoldingsReport>>,
    {
        if let Some(report) = self.get(tracking).await {
            info!(updated_at = %report.updated_at, "Using cached holdings report");
            return Ok(report);
        }
        let report = build().await?;
        self.put(tracking, &report).await;
        Ok(report)
    }
}
