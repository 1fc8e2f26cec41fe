//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;
use tracing::error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A slot hasher returned an index outside `[0, modulus)`
    #[error("hasher produced slot {index} out of range for modulus {modulus}")]
    SlotOutOfRange { index: usize, modulus: usize },

    /// Maintenance tasks need a tokio runtime to be spawned on
    #[error("no tokio runtime available to run maintenance tasks")]
    RuntimeUnavailable,

    /// A maintenance task terminated abnormally
    #[error("maintenance task failed: {0}")]
    MaintenanceFailed(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Fatal ==
/// Raises an unrecoverable fault.
///
/// Used where continuing would leave a shard in an inconsistent state, so
/// the error is logged and turned into a panic instead of being returned.
#[cold]
pub(crate) fn fatal(err: CacheError) -> ! {
    error!("rapidcache fatal: {}", err);
    panic!("rapidcache fatal: {err}");
}
