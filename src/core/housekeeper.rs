use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::core::counter::{STATS_ALL, STATS_FIRST, STATS_UNIQUE};
use crate::core::processor::CollectorState;

/// Time between housekeeping sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic sweeper: evicts expired cache entries and closed-out file
/// buckets, emits a stats record, then resets the per-tick counters.
pub async fn run(state: Arc<CollectorState>) {
    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;
        sweep(&state);
    }
}

/// One housekeeping pass. Split out so tests can drive it directly.
pub fn sweep(state: &CollectorState) {
    let now = Utc::now();
    let (txcache_before, txcache_after) = state.known_txs.evict_expired(now);
    let (files_before, files_after) = state.out_files.evict_expired(now.timestamp());

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    info!(
        txcache_before,
        txcache_after,
        txcache_removed = txcache_before - txcache_after,
        files_before,
        files_after,
        workers,
        tx_per_min = state.tx_cnt.load(Ordering::Relaxed),
        "stats"
    );

    info!(sources = %state.src_cnt.summary(STATS_FIRST, false), "source_stats_first");
    info!(sources = %state.src_cnt.summary(STATS_UNIQUE, true), "source_stats_unique");
    info!(sources = %state.src_cnt.summary(STATS_ALL, false), "source_stats_all");

    // the sweep is the reporting period: counters start over every tick
    state.src_cnt.reset();
    state.tx_cnt.store(0, Ordering::Relaxed);
}
