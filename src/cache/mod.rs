//! Response caching for chain executions

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sha2::{Digest, Sha256};

use crate::chain::{ChainInputs, ChainOutputs};
use crate::config::CacheConfig;

/// In-process cache of chain outputs keyed by chain name + inputs
///
/// Cloning is cheap; all clones share the same store.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Cache<String, Arc<ChainOutputs>>,
}

impl ResponseCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Build from config; a disabled config yields no cache
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self::new(
            config.max_capacity,
            Duration::from_secs(config.ttl_seconds),
        ))
    }

    /// Cache key for one execution
    ///
    /// Inputs are serialized in sorted key order so the key is insensitive to
    /// map iteration order.
    pub fn key(chain_name: &str, inputs: &ChainInputs) -> String {
        let ordered: BTreeMap<&String, &serde_json::Value> = inputs.iter().collect();
        let payload = serde_json::to_string(&ordered).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(chain_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(payload.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn get(&self, key: &str) -> Option<Arc<ChainOutputs>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, outputs: ChainOutputs) {
        self.inner.insert(key, Arc::new(outputs)).await;
    }

    /// Number of cached entries (pending operations flushed first)
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
