use std::collections::HashMap;
use std::sync::Mutex;

/// Counter kind: every arrival.
pub const STATS_ALL: &str = "all";
/// Counter kind: arrivals that were the first sighting of their hash.
pub const STATS_FIRST: &str = "first";
/// Counter kind: distinct hashes per source (cardinality, not sum).
pub const STATS_UNIQUE: &str = "unique";

type Counts = HashMap<String, HashMap<String, HashMap<String, u64>>>;

/// Thread-safe per-source event tally: kind -> source -> key -> count.
///
/// For `all` and `first` the inner key equals the kind, folding the inner
/// map to one scalar per source. For `unique` the inner key is the hash and
/// the map's cardinality is the interesting quantity.
#[derive(Debug, Default)]
pub struct SourceCounter {
    counts: Mutex<Counts>,
}

impl SourceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, kind: &str, source: &str) {
        self.inc_key(kind, source, kind);
    }

    pub fn inc_key(&self, kind: &str, source: &str, key: &str) {
        let mut counts = self.counts.lock().unwrap();
        *counts
            .entry(kind.to_string())
            .or_default()
            .entry(source.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default() += 1;
    }

    /// Snapshot of the `source -> key -> count` mapping for one kind.
    pub fn get(&self, kind: &str) -> HashMap<String, HashMap<String, u64>> {
        let counts = self.counts.lock().unwrap();
        counts.get(kind).cloned().unwrap_or_default()
    }

    /// Drop all counts at once.
    pub fn reset(&self) {
        let mut counts = self.counts.lock().unwrap();
        *counts = Counts::default();
    }

    /// `source=value` pairs for one kind, sorted by source, space-separated.
    /// With `use_len` the value is the inner map's cardinality instead of
    /// the per-kind scalar.
    pub fn summary(&self, kind: &str, use_len: bool) -> String {
        let mut entries: Vec<String> = self
            .get(kind)
            .iter()
            .map(|(source, keys)| {
                let value = if use_len {
                    keys.len() as u64
                } else {
                    keys.get(kind).copied().unwrap_or_default()
                };
                format!("{source}={value}")
            })
            .collect();
        entries.sort();
        entries.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_folds_to_one_scalar_per_source() {
        let counter = SourceCounter::new();
        counter.inc(STATS_ALL, "local");
        counter.inc(STATS_ALL, "local");
        counter.inc(STATS_ALL, "blx");

        let all = counter.get(STATS_ALL);
        assert_eq!(all["local"][STATS_ALL], 2);
        assert_eq!(all["blx"][STATS_ALL], 1);
        assert_eq!(all["local"].len(), 1);
    }

    #[test]
    fn inc_key_cardinality_counts_distinct_keys() {
        let counter = SourceCounter::new();
        counter.inc_key(STATS_UNIQUE, "local", "0xaa");
        counter.inc_key(STATS_UNIQUE, "local", "0xaa");
        counter.inc_key(STATS_UNIQUE, "local", "0xbb");

        let unique = counter.get(STATS_UNIQUE);
        assert_eq!(unique["local"].len(), 2);
        assert_eq!(unique["local"]["0xaa"], 2);
    }

    #[test]
    fn kinds_are_independent() {
        let counter = SourceCounter::new();
        counter.inc(STATS_ALL, "local");
        assert!(counter.get(STATS_FIRST).is_empty());
    }

    #[test]
    fn reset_clears_every_kind() {
        let counter = SourceCounter::new();
        counter.inc(STATS_ALL, "local");
        counter.inc(STATS_FIRST, "local");
        counter.inc_key(STATS_UNIQUE, "blx", "0xaa");

        counter.reset();

        assert!(counter.get(STATS_ALL).is_empty());
        assert!(counter.get(STATS_FIRST).is_empty());
        assert!(counter.get(STATS_UNIQUE).is_empty());
    }

    #[test]
    fn summary_sorted_by_source() {
        let counter = SourceCounter::new();
        counter.inc(STATS_ALL, "local");
        counter.inc(STATS_ALL, "blx");
        counter.inc(STATS_ALL, "blx");
        assert_eq!(counter.summary(STATS_ALL, false), "blx=2 local=1");

        counter.inc_key(STATS_UNIQUE, "local", "0xaa");
        counter.inc_key(STATS_UNIQUE, "local", "0xbb");
        assert_eq!(counter.summary(STATS_UNIQUE, true), "local=2");
    }
}
