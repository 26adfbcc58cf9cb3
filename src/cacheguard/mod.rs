//! Timeout / Cache Wrapper (spec §4.1).
//!
//! Two independent layers compose around every blocking external call:
//! `with_timeout` bounds latency via the shared worker pool, `cached` fronts
//! a TTL+LRU memory tier backed by a persistent disk tier. The composition
//! contract (§4.1) is: `with_timeout` wraps the call *outside* `cached`, so a
//! slow first miss can never poison the cache with a fallback value.

pub mod disk_tier;
pub mod key;
pub mod ttl_lru;
pub mod worker_pool;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

pub use disk_tier::DiskCache;
pub use ttl_lru::TtlLru;
pub use worker_pool::with_timeout;

/// Fronts a pure-ish, potentially expensive computation with a TTL+LRU
/// memory tier and a persistent disk tier. `compute` is only invoked on a
/// full miss across both tiers.
pub struct CacheGuard {
    memory: TtlLru<Vec<u8>>,
    disk: Option<DiskCache>,
}

impl CacheGuard {
    pub fn new(memory_capacity: usize) -> Self {
        Self {
            memory: TtlLru::new(memory_capacity),
            disk: None,
        }
    }

    pub fn with_disk_tier(mut self, path: &Path) -> anyhow::Result<Self> {
        self.disk = Some(DiskCache::open(path)?);
        Ok(self)
    }

    /// `cached(ttl_seconds)` from spec §4.1: cache key is the function id
    /// plus a canonical tuple of arguments, already hashed by the caller via
    /// [`key::cache_key`]. Hit path returns sub-millisecond; miss path
    /// invokes `compute` and populates both tiers.
    pub fn cached<F>(&mut self, cache_key: &str, ttl: Duration, compute: F) -> anyhow::Result<Vec<u8>>
    where
        F: FnOnce() -> anyhow::Result<Vec<u8>>,
    {
        if let Some(hit) = self.memory.get(cache_key) {
            metrics::counter!("cacheguard_memory_hit").increment(1);
            return Ok(hit);
        }

        if let Some(disk) = &self.disk {
            if let Some(hit) = disk.get(cache_key)? {
                metrics::counter!("cacheguard_disk_hit").increment(1);
                self.memory.insert(cache_key.to_string(), hit.clone(), ttl);
                return Ok(hit);
            }
        }

        metrics::counter!("cacheguard_miss").increment(1);
        let value = compute()?;
        self.memory.insert(cache_key.to_string(), value.clone(), ttl);
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.set(cache_key, &value, ttl) {
                warn!(error = %e, "cacheguard: failed to persist to disk tier");
            }
        }
        Ok(value)
    }
}

/// Convenience wrapper matching the two-layer defense-in-depth from spec
/// §4.1: an outer facade timeout (e.g. 40-45s) around a lower data-source
/// timeout (e.g. 30s), so a data adapter that ignores its own timeout
/// argument is still bounded by the facade.
pub struct LayeredTimeout {
    pub facade: Duration,
    pub data_source: Duration,
}

impl LayeredTimeout {
    pub fn new(facade_secs: u64, data_source_secs: u64) -> Self {
        Self {
            facade: Duration::from_secs(facade_secs),
            data_source: Duration::from_secs(data_source_secs),
        }
    }

    pub async fn run<T, Fut, Fb>(&self, fut: Fut, fallback: Fb) -> T
    where
        Fut: Future<Output = T>,
        Fb: FnOnce() -> T,
    {
        match with_timeout(self.facade, fut).await {
            Some(v) => v,
            None => fallback(),
        }
    }
}

pub type SharedCacheGuard = Arc<parking_lot::Mutex<CacheGuard>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_computes_once_per_key() {
        let mut guard = CacheGuard::new(16);
        let mut calls = 0;
        let v1 = guard
            .cached("k1", Duration::from_secs(60), || {
                calls += 1;
                Ok(b"v1".to_vec())
            })
            .unwrap();
        assert_eq!(v1, b"v1");
        assert_eq!(calls, 1);

        // second call with same key must not invoke compute (P5)
        let v2 = guard
            .cached("k1", Duration::from_secs(60), || {
                calls += 1;
                Ok(b"ignored".to_vec())
            })
            .unwrap();
        assert_eq!(v2, b"v1");
        assert_eq!(calls, 1);
    }
}
