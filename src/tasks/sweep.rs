//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::error::{FlagError, Result};

// == Sweep Handle ==
/// Owned handle to a running sweep task.
///
/// Dropping the handle aborts the task; [`SweepHandle::shutdown`] stops it
/// gracefully first.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Stops the sweep, waiting at most `grace` for an in-flight cycle.
    ///
    /// If the task has not finished within `grace` it is aborted. Calling
    /// this more than once is a no-op.
    pub async fn shutdown(&mut self, grace: Duration) {
        let Some(mut task) = self.task.take() else {
            return;
        };

        // The task may already be gone, in which case nobody is listening.
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(grace, &mut task).await {
            Ok(_) => debug!("TTL sweep task stopped"),
            Err(_) => {
                warn!(
                    "TTL sweep task did not stop within {:?}, aborting",
                    grace
                );
                task.abort();
                let _ = task.await;
            }
        }
    }

    /// Returns true while the task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawns a background task that periodically purges expired entries.
///
/// The first sweep runs one `interval` after spawning. The task holds its own
/// reference to the cache and removes entries through the same atomic
/// check-and-delete path as foreground reads.
///
/// # Arguments
/// * `cache` - shared reference to the cache
/// * `interval` - time between sweeps, must be non-zero
///
/// # Errors
/// Returns `FlagError::InvalidConfig` if `interval` is zero or if called
/// outside a tokio runtime.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(TtlCache::<String, u32>::new(Duration::from_secs(30)));
/// let mut sweeper = spawn_sweep_task(cache.clone(), Duration::from_secs(30))?;
/// // Later, during shutdown:
/// sweeper.shutdown(Duration::from_secs(5)).await;
/// ```
pub fn spawn_sweep_task<K, V>(cache: Arc<TtlCache<K, V>>, interval: Duration) -> Result<SweepHandle>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if interval.is_zero() {
        return Err(FlagError::InvalidConfig(
            "Sweep interval must be greater than zero".to_string(),
        ));
    }

    let runtime = Handle::try_current().map_err(|e| {
        FlagError::InvalidConfig(format!("TTL sweep requires a tokio runtime: {}", e))
    })?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = runtime.spawn(async move {
        info!("Starting TTL sweep task with interval of {:?}", interval);

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.purge_expired();

                    if removed > 0 {
                        debug!("TTL sweep: removed {} expired entries", removed);
                    }
                }
                changed = shutdown_rx.changed() => {
                    // A dropped sender also means stop.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    Ok(SweepHandle {
        shutdown_tx,
        task: Some(task),
    })
}
