//! Configuration Module
//!
//! A plain settings value for the cache. Every numeric field left at zero
//! falls back to its default when the cache is built.

use std::fmt;
use std::sync::Arc;

use crate::cache::{DjbHasher, ExpandPolicy, LoadFactorPolicy, SlotHasher};

// == Defaults ==
pub const DEFAULT_SHARD_COUNT: usize = 128;
pub const DEFAULT_BUCKETS_PER_SHARD: usize = 1024;
pub const DEFAULT_TTL_SECONDS: u64 = 60;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 150;
pub const DEFAULT_EXPAND_INTERVAL_SECONDS: u64 = 300;

/// Cache configuration parameters.
#[derive(Clone)]
pub struct Config {
    /// Number of independently locked shards
    pub shard_count: usize,
    /// Bucket count each shard starts with
    pub buckets_per_shard: usize,
    /// Lifetime in seconds of an entry written by `set`
    pub ttl_seconds: u64,
    /// Interval in seconds between cleaner passes
    pub sweep_interval_seconds: u64,
    /// Interval in seconds between expander passes
    pub expand_interval_seconds: u64,
    /// Picks the shard and the bucket for a key
    pub hasher: Arc<dyn SlotHasher>,
    /// Decides when a shard doubles its bucket array
    pub expand_policy: Arc<dyn ExpandPolicy>,
}

impl Config {
    /// Sets the number of shards; 0 keeps the default.
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    /// Sets the initial bucket count of every shard; 0 keeps the default.
    pub fn with_buckets_per_shard(mut self, buckets_per_shard: usize) -> Self {
        self.buckets_per_shard = buckets_per_shard;
        self
    }

    /// Sets the lifetime given to entries written with `set`; 0 keeps the default.
    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Sets the pause between cleaner passes; 0 keeps the default.
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    /// Sets the pause between expander passes; 0 keeps the default.
    pub fn with_expand_interval_seconds(mut self, seconds: u64) -> Self {
        self.expand_interval_seconds = seconds;
        self
    }

    /// Injects a custom hasher. It must return an index strictly below the
    /// modulus it is given; anything else aborts the operation with a panic.
    pub fn with_hasher(mut self, hasher: impl SlotHasher + 'static) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    /// Injects the rule that decides when a shard doubles its buckets.
    pub fn with_expand_policy(mut self, policy: impl ExpandPolicy + 'static) -> Self {
        self.expand_policy = Arc::new(policy);
        self
    }

    // == Resolve ==
    /// Replaces zero-valued fields with their defaults.
    pub fn resolved(self) -> Self {
        fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
            if value == T::default() {
                default
            } else {
                value
            }
        }

        Self {
            shard_count: or_default(self.shard_count, DEFAULT_SHARD_COUNT),
            buckets_per_shard: or_default(self.buckets_per_shard, DEFAULT_BUCKETS_PER_SHARD),
            ttl_seconds: or_default(self.ttl_seconds, DEFAULT_TTL_SECONDS),
            sweep_interval_seconds: or_default(
                self.sweep_interval_seconds,
                DEFAULT_SWEEP_INTERVAL_SECONDS,
            ),
            expand_interval_seconds: or_default(
                self.expand_interval_seconds,
                DEFAULT_EXPAND_INTERVAL_SECONDS,
            ),
            hasher: self.hasher,
            expand_policy: self.expand_policy,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            buckets_per_shard: DEFAULT_BUCKETS_PER_SHARD,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            expand_interval_seconds: DEFAULT_EXPAND_INTERVAL_SECONDS,
            hasher: Arc::new(DjbHasher),
            expand_policy: Arc::new(LoadFactorPolicy::default()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("shard_count", &self.shard_count)
            .field("buckets_per_shard", &self.buckets_per_shard)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .field("expand_interval_seconds", &self.expand_interval_seconds)
            .finish_non_exhaustive()
    }
}
