//! # Result aggregation
//!
//! Merges per-worker reports into corpus-wide statistics and persists the two
//! downstream artifacts: the probability table (consumed by the plotting
//! collaborator, read-merge-write) and the run table (consumed by the
//! visualizer, overwritten each run).
//!
//! Histograms and maximal holders reduce commutatively and associatively, so
//! worker completion order never changes the aggregate statistics. Run lists
//! are concatenated in worker order and never re-merged across shard
//! boundaries: a run split at a shard edge stays split, which over-reports
//! run counts when the corpus is not id-sorted within a bucket — an accepted
//! approximation, not a correctness violation of the statistics.

use crate::classify::{CrossingStats, Run, WorkerReport};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Corpus-wide merge of all worker reports.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub stats: BTreeMap<String, CrossingStats>,
    pub runs: BTreeMap<u32, Vec<Run>>,
    pub processed: u64,
    pub skipped: u64,
    /// Workers whose stream faulted; their partial results are still counted
    pub failed_shards: usize,
}

/// Reduce worker reports in the order given.
pub fn merge_reports(reports: Vec<WorkerReport>) -> Aggregate {
    let mut agg = Aggregate::default();
    for report in reports {
        agg.processed += report.processed;
        agg.skipped += report.skipped;
        if report.error.is_some() {
            agg.failed_shards += 1;
        }
        for (bucket, stats) in &report.stats {
            agg.stats.entry(bucket.clone()).or_default().merge_from(stats);
        }
        for (m, mut runs) in report.runs {
            agg.runs.entry(m).or_default().append(&mut runs);
        }
    }
    agg
}

/// Empirical conditional probabilities per crossing bucket.
///
/// For every bucket with at least one classified record, index i holds
/// Pr(Jm = i+2 | bucket), from Jm = 2 up to and including the bucket's
/// observed maximum; Jm values never seen contribute a zero entry.
pub fn probability_table(agg: &Aggregate) -> BTreeMap<String, Vec<f64>> {
    let mut table = BTreeMap::new();
    for (bucket, stats) in &agg.stats {
        let total = stats.total();
        if total == 0 {
            continue;
        }
        let probs: Vec<f64> = (2..=stats.max_m)
            .map(|m| stats.histogram.get(&m).copied().unwrap_or(0) as f64 / total as f64)
            .collect();
        table.insert(bucket.clone(), probs);
    }
    table
}

/// Read-merge-write the probability table file: existing buckets not touched
/// by this run survive, buckets in `table` are replaced. Not safe against a
/// concurrent run on the same file; callers serialize re-runs.
pub fn update_probability_file(path: &Path, table: &BTreeMap<String, Vec<f64>>) -> Result<()> {
    let mut merged: BTreeMap<String, Vec<f64>> = if path.exists() {
        let file = File::open(path)
            .with_context(|| format!("cannot open probability file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed probability file {}", path.display()))?
    } else {
        BTreeMap::new()
    };
    for (bucket, probs) in table {
        merged.insert(bucket.clone(), probs.clone());
    }
    let out = BufWriter::new(
        File::create(path)
            .with_context(|| format!("cannot write probability file {}", path.display()))?,
    );
    serde_json::to_writer_pretty(out, &merged)?;
    Ok(())
}

/// Overwrite the run table file: Jm value (as a string key, the form the
/// visualizer expects) → list of `[bucket, first_id, last_id, label]` tuples.
pub fn write_run_file(path: &Path, runs: &BTreeMap<u32, Vec<Run>>) -> Result<()> {
    let keyed: BTreeMap<String, &Vec<Run>> =
        runs.iter().map(|(m, list)| (m.to_string(), list)).collect();
    let out = BufWriter::new(
        File::create(path).with_context(|| format!("cannot write run file {}", path.display()))?,
    );
    serde_json::to_writer_pretty(out, &keyed)?;
    Ok(())
}
