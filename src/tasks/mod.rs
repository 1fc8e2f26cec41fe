//! Background Tasks Module
//!
//! Maintenance that runs alongside caller traffic.
//!
//! # Tasks
//! - Cleaner: sweeps expired entries at the configured interval
//! - Expander: doubles overloaded shards at the configured interval

mod cleaner;
mod expander;

pub use cleaner::spawn_cleaner_task;
pub use expander::spawn_expander_task;

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};

// == Maintenance ==
/// Owns the cleaner and expander tasks of one store.
///
/// Dropping it closes the shutdown channel, so both tasks exit after their
/// current pass.
#[derive(Debug)]
pub struct Maintenance {
    cleaner: JoinHandle<()>,
    expander: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Maintenance {
    /// Spawns both tasks on the current tokio runtime.
    ///
    /// Fails with [`CacheError::RuntimeUnavailable`] when called outside of
    /// a runtime.
    pub fn start(store: &Arc<CacheStore>) -> Result<Self> {
        Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable)?;

        let config = store.config();
        let (shutdown, signal) = watch::channel(false);
        let maintenance = Self {
            cleaner: spawn_cleaner_task(
                Arc::clone(store),
                config.sweep_interval_seconds,
                signal.clone(),
            ),
            expander: spawn_expander_task(Arc::clone(store), config.expand_interval_seconds, signal),
            shutdown,
        };
        info!("Maintenance tasks started");
        Ok(maintenance)
    }

    /// Signals both tasks to stop without waiting for them.
    ///
    /// A pass already running on the blocking pool still runs to completion.
    pub fn signal_stop(&self) {
        // Err only when both tasks are already gone
        let _ = self.shutdown.send(true);
    }

    /// Signals both tasks to stop and waits until they have exited.
    ///
    /// Returns only after any in-flight sweep or expand pass has finished
    /// and released the store. A task that had died from a panic is
    /// reported as [`CacheError::MaintenanceFailed`].
    pub async fn stop(self) -> Result<()> {
        self.signal_stop();

        let mut outcome = Ok(());
        for (name, handle) in [("cleaner", self.cleaner), ("expander", self.expander)] {
            match handle.await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    if outcome.is_ok() {
                        outcome = Err(CacheError::MaintenanceFailed(format!("{name}: {err}")));
                    }
                }
            }
        }

        info!("Maintenance tasks stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::Config;

    fn store() -> Arc<CacheStore> {
        Arc::new(CacheStore::new(
            Config::default()
                .with_shard_count(1)
                .with_buckets_per_shard(1),
        ))
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let result = Maintenance::start(&store());
        assert!(matches!(result, Err(CacheError::RuntimeUnavailable)));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let maintenance = Maintenance::start(&store()).unwrap();
        maintenance.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_reports_panicked_task() {
        let store = Arc::new(CacheStore::new(
            Config::default()
                .with_shard_count(1)
                .with_buckets_per_shard(1)
                .with_expand_interval_seconds(1)
                .with_expand_policy(|_: usize, _: usize| true)
                .with_hasher(|_: &str, modulus: usize| if modulus == 1 { 0 } else { modulus }),
        ));
        store.set("k", b"v");
        let maintenance = Maintenance::start(&store).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let result = maintenance.stop().await;
        assert!(matches!(result, Err(CacheError::MaintenanceFailed(msg)) if msg.starts_with("expander")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_waits_for_running_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy_calls = Arc::clone(&calls);
        let store = Arc::new(CacheStore::new(
            Config::default()
                .with_shard_count(4)
                .with_buckets_per_shard(4)
                .with_expand_interval_seconds(1)
                .with_expand_policy(move |_: usize, _: usize| {
                    policy_calls.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(400));
                    false
                }),
        ));
        store.set("k", b"v");
        let maintenance = Maintenance::start(&store).unwrap();

        // The first pass starts at 1s and spends 400ms on each of the 4 shards
        tokio::time::sleep(Duration::from_millis(1200)).await;
        maintenance.stop().await.unwrap();

        // The pass finished and released its reference before stop returned
        assert_eq!(Arc::strong_count(&store), 1);
        let at_stop = calls.load(Ordering::SeqCst);
        assert_eq!(at_stop, 4);

        // No further passes start after stop
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), at_stop);
    }

    #[tokio::test]
    async fn test_dropping_maintenance_ends_tasks() {
        let store = store();
        let maintenance = Maintenance::start(&store).unwrap();
        drop(maintenance);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
