use std::collections::HashMap;
use std::sync::RwLock;

use alloy::primitives::TxHash;
use chrono::{DateTime, Utc};

use crate::core::TX_CACHE_TTL_SECS;

/// In-memory set of already-persisted transaction hashes.
///
/// Read-heavy: the processor probes it on every arrival, the housekeeper
/// walks it once a minute to drop entries past their TTL.
#[derive(Debug, Default)]
pub struct KnownTxCache {
    inner: RwLock<HashMap<TxHash, DateTime<Utc>>>,
}

impl KnownTxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.inner.read().unwrap().contains_key(hash)
    }

    pub fn insert(&self, hash: TxHash, seen_at: DateTime<Utc>) {
        self.inner.write().unwrap().insert(hash, seen_at);
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries older than the TTL. Returns the (before, after) sizes
    /// for the housekeeper's stats record.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> (usize, usize) {
        let mut map = self.inner.write().unwrap();
        let before = map.len();
        map.retain(|_, seen_at| now.signed_duration_since(*seen_at).num_seconds() <= TX_CACHE_TTL_SECS);
        (before, map.len())
    }
}
