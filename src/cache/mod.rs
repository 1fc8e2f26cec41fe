//! Cache Module
//!
//! The sharded hash-table engine: hashing strategies, entry chains,
//! shards, and the store that ties them together.

mod hashing;
mod node;
mod shard;
mod stats;
mod store;


// Re-export public types
pub use hashing::{DjbHasher, ExpandPolicy, LoadFactorPolicy, SlotHasher};
pub use stats::CacheStats;
pub use store::CacheStore;
