//! rapidcache - A sharded in-process key/value cache
//!
//! Entries expire after a TTL. Keys are spread over independently locked
//! shards, each a table of individually locked buckets, and background
//! tasks sweep expired entries and grow overloaded shards.

pub mod cache;
pub mod config;
pub mod error;
mod handle;
pub mod tasks;

pub use cache::{CacheStats, CacheStore, DjbHasher, ExpandPolicy, LoadFactorPolicy, SlotHasher};
pub use config::Config;
pub use error::{CacheError, Result};
pub use handle::Cache;
pub use tasks::{spawn_cleaner_task, spawn_expander_task, Maintenance};
