use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::hex;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::core::counter::{SourceCounter, STATS_ALL, STATS_FIRST, STATS_UNIQUE};
use crate::core::known::KnownTxCache;
use crate::core::outfiles::OutFileCache;
use crate::core::{encode_raw_hex, TxDetail, TxIn};
use crate::rpc::InclusionCheck;

/// Trash-row reason for a transaction that was already mined on arrival.
pub const TRASH_ALREADY_ON_CHAIN: &str = "tx-already-on-chain";

/// State shared between the consumer and the housekeeper.
#[derive(Debug)]
pub struct CollectorState {
    pub known_txs: KnownTxCache,
    pub out_files: OutFileCache,
    pub src_cnt: SourceCounter,
    /// Unique transactions persisted since the last housekeeper reset.
    pub tx_cnt: AtomicU64,
}

impl CollectorState {
    pub fn new(out_dir: impl Into<PathBuf>, uid: impl Into<String>) -> Self {
        Self {
            known_txs: KnownTxCache::new(),
            out_files: OutFileCache::new(out_dir, uid),
            src_cnt: SourceCounter::new(),
            tx_cnt: AtomicU64::new(0),
        }
    }
}

/// Single-consumer transaction processor.
///
/// All file writes and the dedup read-modify-write happen on this one task,
/// which is what makes them race-free without per-file locks.
pub struct TxProcessor {
    state: Arc<CollectorState>,
    checker: Option<Arc<dyn InclusionCheck>>,
    write_sourcelog: bool,
}

impl TxProcessor {
    pub fn new(
        state: Arc<CollectorState>,
        checker: Option<Arc<dyn InclusionCheck>>,
        write_sourcelog: bool,
    ) -> Self {
        Self {
            state,
            checker,
            write_sourcelog,
        }
    }

    /// Consume the fan-in channel until every sender is gone.
    pub async fn run(self, mut rx: mpsc::Receiver<TxIn>) {
        info!("waiting for transactions...");
        while let Some(tx_in) = rx.recv().await {
            self.process_tx(tx_in).await;
        }
        info!("input channel closed, processor stopping");
    }

    async fn process_tx(&self, tx_in: TxIn) {
        let hash = tx_in.hash();
        let hash_hex = hex::encode_prefixed(hash);
        let ts_ms = tx_in.received_at.timestamp_millis();
        let source = tx_in.source;
        debug!(%hash_hex, source, "process_tx");

        // per-source tallies; `unique` is keyed by hash so its cardinality
        // is the number of distinct transactions the source delivered
        self.state.src_cnt.inc(STATS_ALL, source);
        self.state.src_cnt.inc_key(STATS_UNIQUE, source, &hash_hex);

        let (files, created) = match self
            .state
            .out_files
            .get_or_open(tx_in.received_at.timestamp())
        {
            Ok(v) => v,
            Err(e) => {
                error!(%hash_hex, source, error = %e, "opening output files failed");
                return;
            }
        };
        if created {
            info!(path = %files.txs_path.display(), "new file created");
            info!(path = %files.sourcelog_path.display(), "new file created");
            info!(path = %files.trash_path.display(), "new file created");
        }

        // every arrival lands in the sourcelog, duplicates included
        if self.write_sourcelog {
            let line = format!("{ts_ms},{hash_hex},{source}\n");
            if let Err(e) = (&files.sourcelog).write_all(line.as_bytes()) {
                error!(%hash_hex, source, error = %e, "sourcelog write failed");
                return;
            }
        }

        if self.state.known_txs.contains(&hash) {
            debug!(%hash_hex, source, "transaction already processed");
            return;
        }

        if let Some(checker) = &self.checker {
            match checker.tx_inclusion(hash).await {
                Ok(Some(block)) => {
                    debug!(%hash_hex, block, "transaction already included");
                    let line =
                        format!("{ts_ms},{hash_hex},{source},{TRASH_ALREADY_ON_CHAIN},{block}\n");
                    if let Err(e) = (&files.trash).write_all(line.as_bytes()) {
                        error!(%hash_hex, source, error = %e, "trash write failed");
                    }
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    // not authoritative, carry on as if pending
                    error!(%hash_hex, source, error = %e, "inclusion check failed");
                }
            }
        }

        self.state.tx_cnt.fetch_add(1, Ordering::Relaxed);
        self.state.src_cnt.inc(STATS_FIRST, source);

        let raw_tx = match encode_raw_hex(&tx_in.tx) {
            Ok(raw) => raw,
            Err(e) => {
                error!(%hash_hex, source, error = %e, "encoding raw transaction failed");
                return;
            }
        };

        let detail = TxDetail {
            timestamp_ms: ts_ms,
            hash: hash_hex.clone(),
            raw_tx,
        };
        if let Err(e) = (&files.txs).write_all(detail.csv_line().as_bytes()) {
            error!(%hash_hex, source, error = %e, "txs write failed");
            return;
        }

        // only once the row is on disk, so a redelivery can re-persist it
        self.state.known_txs.insert(hash, tx_in.received_at);
    }
}
