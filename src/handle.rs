//! Cache Handle
//!
//! The top-level handle callers hold: the shared store plus the lifetime of
//! its maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::{CacheStats, CacheStore};
use crate::config::Config;
use crate::error::Result;
use crate::tasks::Maintenance;

/// A sharded TTL cache.
///
/// Built with [`Cache::new`] the cleaner and expander run on their own
/// schedule; built with [`Cache::manual`] the caller drives
/// [`sweep`](Cache::sweep) and [`expand`](Cache::expand) itself.
#[derive(Debug)]
pub struct Cache {
    store: Arc<CacheStore>,
    maintenance: Option<Maintenance>,
}

impl Cache {
    /// Builds a cache and starts its maintenance tasks on the current tokio
    /// runtime.
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(CacheStore::new(config));
        let maintenance = Maintenance::start(&store)?;
        Ok(Self {
            store,
            maintenance: Some(maintenance),
        })
    }

    /// Builds a cache without background maintenance.
    pub fn manual(config: Config) -> Self {
        Self {
            store: Arc::new(CacheStore::new(config)),
            maintenance: None,
        }
    }

    /// Non-blocking lookup; see [`CacheStore::get`].
    pub fn get(&self, key: &str, dst: &mut [u8]) -> bool {
        self.store.get(key, dst)
    }

    /// Blocking lookup; see [`CacheStore::get_blocking`].
    pub fn get_blocking(&self, key: &str, dst: &mut [u8]) -> bool {
        self.store.get_blocking(key, dst)
    }

    pub fn get_value(&self, key: &str) -> Option<Vec<u8>> {
        self.store.get_value(key)
    }

    pub fn set(&self, key: &str, value: &[u8]) -> bool {
        self.store.set(key, value)
    }

    pub fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> bool {
        self.store.set_with_ttl(key, value, ttl)
    }

    /// Runs one cleaner pass now; returns the entries removed.
    pub fn sweep(&self) -> usize {
        self.store.sweep()
    }

    /// Runs one expander pass now; returns the shards grown.
    pub fn expand(&self) -> usize {
        self.store.expand()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn has_maintenance(&self) -> bool {
        self.maintenance.is_some()
    }

    // == Destroy ==
    /// Stops maintenance and frees every entry.
    ///
    /// Waits for a sweep or expand pass that is already running before
    /// tearing the store down. Returns the number of entries freed, or the failure of a maintenance
    /// task that had died before teardown. Entries are freed either way.
    pub async fn destroy(mut self) -> Result<usize> {
        let stopped = match self.maintenance.take() {
            Some(maintenance) => maintenance.stop().await,
            None => Ok(()),
        };

        let freed = self.store.teardown();
        info!("Cache destroyed, freed {} entries", freed);
        stopped.map(|()| freed)
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        if let Some(maintenance) = self.maintenance.take() {
            maintenance.signal_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::CacheError;

    fn config() -> Config {
        Config::default()
            .with_shard_count(4)
            .with_buckets_per_shard(4)
    }

    #[test]
    fn test_new_requires_runtime() {
        assert!(matches!(
            Cache::new(config()),
            Err(CacheError::RuntimeUnavailable)
        ));
    }

    #[test]
    fn test_manual_cache_destroy() {
        let cache = Cache::manual(config());
        assert!(!cache.has_maintenance());
        cache.set("a", b"1");
        cache.set("b", b"2");

        let freed = tokio_test::block_on(cache.destroy()).unwrap();
        assert_eq!(freed, 2);
    }

    #[tokio::test]
    async fn test_new_starts_maintenance() {
        let cache = Cache::new(config()).unwrap();
        assert!(cache.has_maintenance());
        cache.set("k", b"v");

        assert_eq!(cache.destroy().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_destroy_waits_for_running_pass() {
        let passes = Arc::new(AtomicUsize::new(0));
        let policy_passes = Arc::clone(&passes);
        let cache = Cache::new(
            config()
                .with_expand_interval_seconds(1)
                .with_expand_policy(move |_: usize, _: usize| {
                    policy_passes.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(300));
                    false
                }),
        )
        .unwrap();
        cache.set("k", b"v");
        let store = Arc::clone(cache.store());

        // Lands in the middle of the first expander pass
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(cache.destroy().await.unwrap(), 1);

        assert_eq!(Arc::strong_count(&store), 1);
        assert_eq!(passes.load(Ordering::SeqCst), 4);
        assert_eq!(store.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_drop_stops_maintenance() {
        let cache = Cache::new(config()).unwrap();
        let store = Arc::clone(cache.store());
        drop(cache);

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Only the test's reference remains once both tasks are gone
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
