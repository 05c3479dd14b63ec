pub mod counter;
pub mod housekeeper;
pub mod known;
pub mod outfiles;
pub mod processor;

use alloy::consensus::{TxEip4844Variant, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{hex, TxHash};
use chrono::{DateTime, Utc};

/// Capacity of the fan-in channel feeding the processor. Adapters block on
/// send when it is full, so backpressure ends up at the provider connection.
pub const INPUT_QUEUE_SIZE: usize = 100;

/// Width of one output time bucket.
pub const BUCKET_MINUTES: i64 = 60;
pub const BUCKET_SECS: i64 = BUCKET_MINUTES * 60;

/// How long a hash stays in the known-transactions cache.
pub const TX_CACHE_TTL_SECS: i64 = 30 * 60;

/// Source tags, one per adapter.
pub const SOURCE_LOCAL: &str = "local";
pub const SOURCE_BLX: &str = "blx";
pub const SOURCE_EDEN: &str = "eden";

/// One observation of a mempool transaction, as submitted by a source
/// adapter. Sent by value through the fan-in channel; ownership moves with
/// the submission, so an adapter cannot touch it afterwards.
#[derive(Debug, Clone)]
pub struct TxIn {
    /// Wall-clock instant at which the adapter saw the transaction.
    /// Millisecond resolution; never set by the processor.
    pub received_at: DateTime<Utc>,
    pub tx: TxEnvelope,
    /// Short tag naming the adapter ("local", "blx", ...).
    pub source: &'static str,
}

impl TxIn {
    pub fn new(tx: TxEnvelope, source: &'static str) -> Self {
        Self {
            received_at: Utc::now(),
            tx,
            source,
        }
    }

    pub fn hash(&self) -> TxHash {
        *self.tx.tx_hash()
    }
}

/// Persisted row for a first observation.
#[derive(Debug, Clone)]
pub struct TxDetail {
    pub timestamp_ms: i64,
    pub hash: String,
    pub raw_tx: String,
}

impl TxDetail {
    pub fn csv_line(&self) -> String {
        format!("{},{},{}\n", self.timestamp_ms, self.hash, self.raw_tx)
    }
}

/// Canonical network serialization (EIP-2718) of a transaction, 0x-prefixed
/// lowercase hex.
///
/// Blob transactions are only canonical together with their sidecar; a
/// pooled blob tx that arrived without one cannot be re-serialized for
/// replay and is rejected.
pub fn encode_raw_hex(tx: &TxEnvelope) -> Result<String, EncodeError> {
    if let TxEnvelope::Eip4844(signed) = tx {
        if matches!(signed.tx(), TxEip4844Variant::TxEip4844(_)) {
            return Err(EncodeError::MissingBlobSidecar);
        }
    }
    Ok(hex::encode_prefixed(tx.encoded_2718()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// EIP-4844 transaction delivered without its blob sidecar.
    MissingBlobSidecar,
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::MissingBlobSidecar => write!(f, "blob transaction without sidecar"),
        }
    }
}

impl std::error::Error for EncodeError {}


#[cfg(test)]
mod tests {
    use super::testutil::{blob_tx_without_sidecar, legacy_tx};
    use super::*;
    use alloy::eips::eip2718::Decodable2718;

    #[test]
    fn raw_hex_is_prefixed_lowercase_and_decodable() {
        let tx = legacy_tx(0xab);
        let raw = encode_raw_hex(&tx).unwrap();
        assert!(raw.starts_with("0x"));
        assert_eq!(raw, raw.to_lowercase());

        let bytes = hex::decode(&raw).unwrap();
        let decoded = TxEnvelope::decode_2718(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded.encoded_2718(), bytes);
    }

    #[test]
    fn blob_tx_without_sidecar_refuses_to_encode() {
        let tx = blob_tx_without_sidecar();
        assert_eq!(encode_raw_hex(&tx), Err(EncodeError::MissingBlobSidecar));
    }

    #[test]
    fn same_seed_same_hash() {
        assert_eq!(legacy_tx(7).tx_hash(), legacy_tx(7).tx_hash());
        assert_ne!(legacy_tx(7).tx_hash(), legacy_tx(8).tx_hash());
    }

    #[test]
    fn tx_detail_csv_line() {
        let detail = TxDetail {
            timestamp_ms: 1_700_000_000_000,
            hash: "0xaa".into(),
            raw_tx: "0xbb".into(),
        };
        assert_eq!(detail.csv_line(), "1700000000000,0xaa,0xbb\n");
    }
}
