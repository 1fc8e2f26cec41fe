//! Cleaner Task
//!
//! Background task that periodically sweeps expired entries out of every
//! shard.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Spawns a background task that sweeps the store every
/// `sweep_interval_secs` seconds.
///
/// Each pass runs on tokio's blocking pool because it takes the shard and
/// bucket locks synchronously. A pass that panics ends the task with the
/// same panic.
///
/// # Arguments
/// * `shutdown` - The task exits once this changes or its sender is
///   dropped. A pass already running is finished first.
///
/// # Returns
/// A JoinHandle that resolves after the task has exited.
pub fn spawn_cleaner_task(
    store: Arc<CacheStore>,
    sweep_interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting cleaner task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::select! {
                biased;
                // A closed channel means the owner is gone
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let pass = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || pass.sweep()).await {
                Ok(0) => debug!("Cleaner: no expired entries found"),
                Ok(removed) => info!("Cleaner: removed {} expired entries", removed),
                Err(err) if err.is_panic() => {
                    warn!("Cleaner pass panicked, stopping cleaner task");
                    std::panic::resume_unwind(err.into_panic());
                }
                Err(err) => warn!("Cleaner pass did not complete: {}", err),
            }
        }

        info!("Cleaner task stopped");
    })
}
