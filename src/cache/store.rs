//! Cache Store Module
//!
//! The sharded table. Lock order is always shard, then bucket, and guards
//! are released in reverse. Shard locks are write-held only while a shard is
//! replaced (expansion) or torn down; every other path holds them shared.

use std::time::Duration;

use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::cache::node::{expiry_after, Node};
use crate::cache::shard::Shard;
use crate::cache::stats::{CacheStats, Counters};
use crate::config::Config;
use crate::error::{fatal, CacheError};

/// How a lookup acquires its read locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    /// Give up at once if a lock is held exclusively
    Try,
    /// Wait for the lock
    Block,
}

fn read_lock<T>(lock: &RwLock<T>, mode: LockMode) -> Option<RwLockReadGuard<'_, T>> {
    match mode {
        LockMode::Try => lock.try_read(),
        LockMode::Block => Some(lock.read()),
    }
}

// == Cache Store ==
/// Thread-safe sharded key/value table with TTL expiry.
#[derive(Debug)]
pub struct CacheStore {
    shards: Box<[RwLock<Shard>]>,
    config: Config,
    counters: Counters,
}

impl CacheStore {
    // == Constructor ==
    /// Builds the table. Zero-valued config fields take their defaults.
    pub fn new(config: Config) -> Self {
        let config = config.resolved();
        let shards = (0..config.shard_count)
            .map(|_| RwLock::new(Shard::new(config.buckets_per_shard)))
            .collect();

        debug!(
            "Cache store created: shards={}, buckets_per_shard={}, ttl={}s",
            config.shard_count, config.buckets_per_shard, config.ttl_seconds
        );

        Self {
            shards,
            config,
            counters: Counters::default(),
        }
    }

    /// Returns the resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_seconds)
    }

    // == Slot ==
    /// Runs the configured hasher; an out-of-range index is fatal.
    fn slot(&self, key: &str, modulus: usize) -> usize {
        let index = self.config.hasher.slot(key, modulus);
        if index >= modulus {
            fatal(CacheError::SlotOutOfRange { index, modulus });
        }
        index
    }

    /// Returns the shard a key lives in.
    pub fn shard_index(&self, key: &str) -> usize {
        self.slot(key, self.shards.len())
    }

    // == Get ==
    /// Copies the value for `key` into `dst` without waiting on any lock.
    ///
    /// Returns false when the key is absent or expired, and also when its
    /// shard or bucket is currently locked; the two cases are deliberately
    /// indistinguishable. At most `dst.len()` bytes are copied, so a short
    /// buffer receives a prefix of the value.
    pub fn get(&self, key: &str, dst: &mut [u8]) -> bool {
        self.read_with(key, LockMode::Try, |node| node.copy_into(dst))
            .is_some()
    }

    /// Same as [`get`](Self::get) but waits for both locks, so false always
    /// means absent or expired.
    pub fn get_blocking(&self, key: &str, dst: &mut [u8]) -> bool {
        self.read_with(key, LockMode::Block, |node| node.copy_into(dst))
            .is_some()
    }

    /// Returns a copy of the whole value, failing closed like [`get`](Self::get).
    pub fn get_value(&self, key: &str) -> Option<Vec<u8>> {
        self.read_with(key, LockMode::Try, |node| node.value.clone())
    }

    fn read_with<R>(&self, key: &str, mode: LockMode, read: impl FnOnce(&Node) -> R) -> Option<R> {
        let Some(shard) = read_lock(&self.shards[self.shard_index(key)], mode) else {
            self.counters.record_contended();
            return None;
        };
        let bucket_lock = shard.bucket(self.slot(key, shard.bucket_count()));
        let Some(bucket) = read_lock(bucket_lock, mode) else {
            self.counters.record_contended();
            return None;
        };

        match bucket.find(key, Utc::now()) {
            Some(node) => {
                self.counters.record_hit();
                Some(read(node))
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key` with the configured TTL.
    ///
    /// Waits for the locks it needs and always returns true.
    pub fn set(&self, key: &str, value: &[u8]) -> bool {
        self.set_with_ttl(key, value, Some(self.ttl()))
    }

    /// Stores `value` under `key` with its own TTL; `None` never expires.
    pub fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> bool {
        let shard = self.shards[self.shard_index(key)].read();
        let mut bucket = shard.bucket(self.slot(key, shard.bucket_count())).write();

        let expires_at = expiry_after(Utc::now(), ttl);
        if bucket.upsert(key, value, expires_at) {
            shard.record_insert();
        }
        true
    }

    // == Sweep ==
    /// One cleaner pass: unlinks expired entries from every shard.
    ///
    /// Buckets whose lock is held are skipped until the next pass. Returns
    /// the number of entries removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        let mut skipped = 0;

        for lock in self.shards.iter() {
            let shard = lock.read();
            let mut from_shard = 0;

            for bucket_lock in shard.buckets() {
                match bucket_lock.try_write() {
                    Some(mut bucket) => from_shard += bucket.purge_expired(Utc::now()),
                    None => skipped += 1,
                }
            }
            shard.record_removed(from_shard);
            removed += from_shard;
        }

        if skipped > 0 {
            debug!("Sweep skipped {} contended buckets", skipped);
        }
        self.counters.record_evictions(removed);
        removed
    }

    // == Expand ==
    /// One expander pass: doubles every shard the expand policy selects.
    ///
    /// Live entries are rehashed into the new buckets in their original
    /// order and their TTL restarts from now; expired ones are dropped.
    /// Returns the number of shards grown.
    pub fn expand(&self) -> usize {
        let mut grown = 0;

        for (index, lock) in self.shards.iter().enumerate() {
            let mut shard = lock.write();
            let bucket_count = shard.bucket_count();
            if !self
                .config
                .expand_policy
                .should_expand(bucket_count, shard.live_count())
            {
                continue;
            }
            let Some(new_count) = bucket_count.checked_mul(2) else {
                continue;
            };

            let now = Utc::now();
            let refreshed = expiry_after(now, Some(self.ttl()));
            let next = shard.rebuild(
                new_count,
                now,
                |key| self.slot(key, new_count),
                |node| node.expires_at.and(refreshed),
            );
            *shard = next;

            debug!(
                "Expanded shard {} from {} to {} buckets ({} entries)",
                index,
                bucket_count,
                new_count,
                shard.live_count()
            );
            self.counters.record_expansion();
            grown += 1;
        }
        grown
    }

    // == Teardown ==
    /// Frees every entry, taking each shard exclusively in turn.
    /// Returns the number of entries released.
    pub fn teardown(&self) -> usize {
        self.shards.iter().map(|lock| lock.write().clear()).sum()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.counters.snapshot();
        stats.shards = self.shards.len();
        for lock in self.shards.iter() {
            let shard = lock.read();
            stats.buckets += shard.bucket_count();
            stats.entries += shard.live_count();
        }
        stats
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Current bucket count of shard `index`.
    pub fn shard_bucket_count(&self, index: usize) -> usize {
        self.shards[index].read().bucket_count()
    }

    /// Approximate entry count of shard `index`.
    pub fn shard_live_count(&self, index: usize) -> usize {
        self.shards[index].read().live_count()
    }
}
