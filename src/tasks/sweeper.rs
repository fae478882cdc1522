//! TTL Sweeper Task
//!
//! Background task that periodically removes entries whose expiry bucket
//! has elapsed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Something the sweeper can ask to drop its expired entries.
pub trait Sweep {
    /// Removes every entry in an elapsed bucket, returning how many were removed.
    fn sweep(&self) -> usize;
}

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// The task holds only a weak reference to its target and the timer. It
/// exits when:
/// - `shutdown` flips to `true` or its sender is dropped
/// - the target has been dropped
///
/// A panic inside one sweep is logged and the next tick proceeds as usual.
///
/// # Arguments
/// * `handle` - Runtime to spawn on
/// * `target` - Weak reference to the cache being swept
/// * `interval` - Tick period, normally the expiry bucket width
/// * `shutdown` - Optional cancellation signal
pub fn spawn_sweeper<T>(
    handle: &Handle,
    target: Weak<T>,
    interval: Duration,
    mut shutdown: Option<watch::Receiver<bool>>,
) -> JoinHandle<()>
where
    T: Sweep + Send + Sync + 'static,
{
    handle.spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting TTL sweeper");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancelled(&mut shutdown) => {
                    info!("TTL sweeper cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(target) = target.upgrade() else {
                        debug!("Swept cache dropped, stopping TTL sweeper");
                        break;
                    };

                    match panic::catch_unwind(AssertUnwindSafe(|| target.sweep())) {
                        Ok(0) => debug!("TTL sweep: no expired entries found"),
                        Ok(removed) => info!("TTL sweep: removed {} expired entries", removed),
                        Err(_) => error!("TTL sweep panicked; retrying on next tick"),
                    }
                }
            }
        }
    })
}

/// Resolves once cancellation is requested. Pending forever without a signal.
async fn cancelled(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = shutdown else {
        return std::future::pending().await;
    };

    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
