//! Expander Task
//!
//! Background task that periodically grows shards whose load has crossed
//! the expand policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;

/// Spawns a background task that runs an expander pass every
/// `expand_interval_secs` seconds.
///
/// A pass that panics (a hasher returning an out-of-range slot) ends the
/// task with the same panic. Like the cleaner, it exits between passes
/// once `shutdown` changes or its sender is dropped.
pub fn spawn_expander_task(
    store: Arc<CacheStore>,
    expand_interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(expand_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expander task with interval of {} seconds",
            expand_interval_secs
        );

        loop {
            tokio::select! {
                biased;
                // A closed channel means the owner is gone
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let pass = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || pass.expand()).await {
                Ok(0) => debug!("Expander: no shard needed to grow"),
                Ok(grown) => info!("Expander: grew {} shards", grown),
                Err(err) if err.is_panic() => {
                    error!("Expander pass panicked, stopping expander task");
                    std::panic::resume_unwind(err.into_panic());
                }
                Err(err) => warn!("Expander pass did not complete: {}", err),
            }
        }

        info!("Expander task stopped");
    })
}
