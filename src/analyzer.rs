//! Offline sourcelog analysis: which source saw which transaction first.
//!
//! Operates purely on the persisted CSV tree; no network, no collector
//! state. `txharbor analyze <day-directory>` prints the report.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use crate::core::SOURCE_LOCAL;

/// First-seen timestamp (ms) per transaction per source: hash -> source -> ts.
pub type Sourcelog = HashMap<String, HashMap<String, i64>>;

/// Parse every CSV under `<dir>/sourcelog/` into a first-seen mapping.
/// Rows are `<ts_ms>,<hash>,<source>`; malformed rows are skipped.
pub fn load_sourcelog(dir: &Path) -> io::Result<Sourcelog> {
    let mut log = Sourcelog::new();
    for entry in fs::read_dir(dir.join("sourcelog"))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let contents = fs::read_to_string(&path)?;
        for line in contents.lines() {
            let mut fields = line.splitn(3, ',');
            let (Some(ts), Some(hash), Some(source)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let Ok(ts) = ts.parse::<i64>() else { continue };
            let first = log
                .entry(hash.to_lowercase())
                .or_default()
                .entry(source.to_string())
                .or_insert(ts);
            if ts < *first {
                *first = ts;
            }
        }
    }
    Ok(log)
}

/// Cross-source rollup of one day's sourcelog.
pub struct Analyzer {
    sourcelog: Sourcelog,
    sources: Vec<String>,
    txs_per_source: BTreeMap<String, u64>,
    exclusive_per_source: BTreeMap<String, u64>,
}

impl Analyzer {
    pub fn new(sourcelog: Sourcelog) -> Self {
        let mut txs_per_source: BTreeMap<String, u64> = BTreeMap::new();
        let mut exclusive_per_source: BTreeMap<String, u64> = BTreeMap::new();
        for sources in sourcelog.values() {
            for source in sources.keys() {
                *txs_per_source.entry(source.clone()).or_default() += 1;
            }
            if sources.len() == 1 {
                if let Some(source) = sources.keys().next() {
                    *exclusive_per_source.entry(source.clone()).or_default() += 1;
                }
            }
        }
        let sources = txs_per_source.keys().cloned().collect();
        Self {
            sourcelog,
            sources,
            txs_per_source,
            exclusive_per_source,
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// First-seen deltas in ms (`source` minus `reference`), ascending, over
    /// transactions both saw. Negative means `source` was earlier.
    fn deltas(&self, source: &str, reference: &str) -> Vec<i64> {
        let mut deltas: Vec<i64> = self
            .sourcelog
            .values()
            .filter_map(|per_source| {
                match (per_source.get(source), per_source.get(reference)) {
                    (Some(s), Some(r)) => Some(s - r),
                    _ => None,
                }
            })
            .collect();
        deltas.sort_unstable();
        deltas
    }

    /// Plain-text report: totals, per-source table, pairwise latency
    /// percentiles against the reference source.
    pub fn report(&self, reference: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Sourcelog analysis");
        let _ = writeln!(out, "==================");
        let _ = writeln!(out);
        let _ = writeln!(out, "Unique transactions: {}", self.sourcelog.len());
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<12} {:>12} {:>12}", "Source", "Transactions", "Exclusive");
        for source in &self.sources {
            let _ = writeln!(
                out,
                "{:<12} {:>12} {:>12}",
                source,
                self.txs_per_source.get(source).copied().unwrap_or_default(),
                self.exclusive_per_source
                    .get(source)
                    .copied()
                    .unwrap_or_default(),
            );
        }

        for source in &self.sources {
            if source == reference {
                continue;
            }
            let deltas = self.deltas(source, reference);
            if deltas.is_empty() {
                continue;
            }
            let shared = deltas.len();
            let source_first = deltas.iter().filter(|d| **d < 0).count();
            let reference_first = deltas.iter().filter(|d| **d > 0).count();

            let _ = writeln!(out);
            let _ = writeln!(out, "{source} vs {reference}: {shared} shared transactions");
            let _ = writeln!(
                out,
                "  {source} first: {source_first} ({:.1}%), {reference} first: {reference_first} ({:.1}%)",
                percentage(source_first, shared),
                percentage(reference_first, shared),
            );
            for q in [10usize, 25, 50, 75, 90] {
                let idx = (q * shared / 100).min(shared - 1);
                let _ = writeln!(out, "  p{q:<2} delta: {} ms", deltas[idx]);
            }
        }

        out
    }
}

fn percentage(amount: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    amount as f64 / total as f64 * 100.0
}

/// Load a day directory and render its report. The local node is the
/// latency reference when present, else the alphabetically first source.
pub fn report_for_dir(dir: &Path) -> io::Result<String> {
    let analyzer = Analyzer::new(load_sourcelog(dir)?);
    let reference = if analyzer.sources().iter().any(|s| s == SOURCE_LOCAL) {
        SOURCE_LOCAL.to_string()
    } else {
        analyzer.sources().first().cloned().unwrap_or_default()
    };
    Ok(analyzer.report(&reference))
}
