//! LRU TTL Cache - demo workload
//!
//! Builds a cache from environment variables and drives it with a handful of
//! concurrent workers until interrupted, logging statistics as it goes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lru_ttl_cache::{CacheConfig, LruCache, Ttl};

const WORKERS: usize = 8;
const KEY_SPACE: u64 = 4_096;
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache with an eviction callback and a shutdown channel
/// 4. Spawn workers that mix set, get, update and delete
/// 5. Log statistics until SIGINT/SIGTERM, then stop everything
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lru_ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LRU TTL cache demo");

    let mut config = CacheConfig::from_env().context("loading cache configuration")?;
    if config.capacity == 0 {
        config.capacity = 1_024;
    }
    if config.default_ttl.is_none() {
        config.default_ttl = Some(Ttl::After(Duration::from_secs(10)));
    }
    info!(
        capacity = config.capacity,
        default_ttl = ?config.default_ttl,
        bucket_width_ms = config.bucket_width.as_millis() as u64,
        "Configuration loaded"
    );

    let evicted = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let counter = Arc::clone(&evicted);
    let cache: LruCache<String, u64> = LruCache::builder()
        .config(config)
        .on_evict(move |key: &String, _value: &u64| {
            counter.fetch_add(1, Ordering::Relaxed);
            debug!(%key, "Evicted");
        })
        .shutdown(shutdown_rx.clone())
        .build()
        .context("building cache")?;

    let mut workers = JoinSet::new();
    for worker in 0..WORKERS {
        workers.spawn(run_worker(cache.clone(), worker as u64, shutdown_rx.clone()));
    }
    info!(workers = WORKERS, "Workload started");

    let reporter = {
        let cache = cache.clone();
        let evicted = Arc::clone(&evicted);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATS_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = cache.stats();
                info!(
                    entries = stats.total_entries,
                    hits = stats.hits,
                    misses = stats.misses,
                    hit_rate = stats.hit_rate(),
                    evictions = stats.evictions,
                    expirations = stats.expirations,
                    callbacks = evicted.load(Ordering::Relaxed),
                    shards = cache.shard_count(),
                    "Cache statistics"
                );
            }
        })
    };

    shutdown_signal().await;

    // Stops the sweeper and the workers
    shutdown_tx.send(true).context("signalling shutdown")?;
    reporter.abort();
    while let Some(result) = workers.join_next().await {
        if let Err(err) = result {
            error!(error = %err, "Worker failed");
        }
    }

    let stats = cache.stats();
    info!(
        entries = stats.total_entries,
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        expirations = stats.expirations,
        "Demo shutdown complete"
    );
    Ok(())
}

/// One worker: a deterministic pseudo-random walk over the key space.
async fn run_worker(cache: LruCache<String, u64>, seed: u64, mut shutdown: watch::Receiver<bool>) {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut ticker = tokio::time::interval(Duration::from_millis(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        for _ in 0..64 {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            let key = format!("key:{}", state % KEY_SPACE);
            match state % 10 {
                0..=5 => {
                    let _ = cache.get(key.as_str());
                }
                6..=7 => {
                    cache.set(key, state, None);
                }
                8 => {
                    cache.update(key.as_str(), state);
                }
                _ => {
                    cache.delete(key.as_str());
                }
            }
        }
    }

    debug!(worker = seed, "Worker stopped");
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
