//! Eviction Notifier
//!
//! Hands removed entries to the user's eviction callback without making the
//! removing caller wait for it.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::cache::Entry;

/// In-flight callback count at which the listener starts warning.
const BACKLOG_WARN_THRESHOLD: usize = 1_024;

/// Callback invoked with the key and value of a removed entry.
pub type EvictionCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

// == Notifier ==
/// Sending half of the eviction channel, owned by the cache.
#[derive(Debug)]
pub(crate) struct Notifier<K, V> {
    tx: mpsc::UnboundedSender<Arc<Entry<K, V>>>,
}

impl<K, V> Notifier<K, V> {
    /// Queues an entry for the callback. Never blocks.
    pub fn notify(&self, entry: Arc<Entry<K, V>>) {
        if self.tx.send(entry).is_err() {
            debug!("Eviction listener has stopped, dropping notification");
        }
    }
}

/// Spawns the listener that drains the eviction channel.
///
/// Each callback runs on the blocking pool so a slow callback cannot stall a
/// runtime worker, and callbacks do not wait for one another, so they carry
/// no ordering. A panicking callback is logged and the listener moves on.
/// The listener exits once the cache, and with it the [`Notifier`], is
/// dropped and every started callback has returned.
pub(crate) fn spawn_eviction_listener<K, V>(
    handle: &Handle,
    callback: EvictionCallback<K, V>,
) -> (Notifier<K, V>, JoinHandle<()>)
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Entry<K, V>>>();

    let listener = handle.spawn(async move {
        info!("Starting eviction listener");

        // Callbacks run concurrently; one slow callback does not hold up the rest
        let mut running = JoinSet::new();
        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(entry) = received else { break };
                    let callback = Arc::clone(&callback);
                    running.spawn_blocking(move || callback(entry.key(), entry.value()));
                    if running.len() >= BACKLOG_WARN_THRESHOLD
                        && running.len() % BACKLOG_WARN_THRESHOLD == 0
                    {
                        warn!(in_flight = running.len(), "Eviction callbacks are falling behind");
                    }
                }
                Some(outcome) = running.join_next(), if !running.is_empty() => {
                    log_callback_outcome(outcome);
                }
            }
        }

        // Sender dropped: let the callbacks already started finish
        while let Some(outcome) = running.join_next().await {
            log_callback_outcome(outcome);
        }

        info!("Eviction listener stopped");
    });

    (Notifier { tx }, listener)
}

fn log_callback_outcome(outcome: Result<(), JoinError>) {
    if let Err(err) = outcome {
        if err.is_panic() {
            error!("Eviction callback panicked; continuing with next notification");
        } else {
            debug!(error = %err, "Eviction callback was cancelled");
        }
    }
}
