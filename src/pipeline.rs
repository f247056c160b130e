//! # Pipeline driver
//!
//! Orchestrates one full classification run: split the corpus into shards,
//! fan the shards out over a fixed-size rayon pool (one worker task per
//! shard, no shared mutable state), block for all workers, merge, and persist
//! the probability and run tables. Worker faults cost only their shard's
//! remainder; the run always produces best-effort aggregate results from
//! whatever succeeded.

use crate::aggregate::{
    merge_reports, probability_table, update_probability_file, write_run_file, Aggregate,
};
use crate::classify::{classify_shard, ClassifyConfig};
use crate::split::split_corpus;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One classification run, start to finish.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub corpus: PathBuf,
    /// Worker pool size; also the shard count
    pub workers: usize,
    pub classify: ClassifyConfig,
    /// Directory receiving the shard files
    pub splits_dir: PathBuf,
    /// Probability table, read-merge-written
    pub prob_file: PathBuf,
    /// Run table, overwritten
    pub knot_id_file: PathBuf,
}

#[derive(Debug)]
pub struct RunSummary {
    pub shards: usize,
    pub failed_shards: usize,
    pub fallback_boundaries: usize,
    pub processed: u64,
    pub skipped: u64,
    pub buckets: usize,
    pub elapsed: Duration,
}

/// Split → parallel classify → merge → persist.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let started = Instant::now();
    let workers = config.workers.max(1);

    eprintln!(
        "splitting {} into {} shards...",
        config.corpus.display(),
        workers
    );
    let split = split_corpus(&config.corpus, workers, &config.splits_dir)?;
    eprintln!(
        "file size: {:.2} GB; data section: bytes {} to {}",
        split.file_size as f64 / (1u64 << 30) as f64,
        split.data_start,
        split.data_end
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("building the worker pool")?;
    eprintln!("processing {} shards with {} workers...", split.shards.len(), workers);
    let reports = pool.install(|| {
        split
            .shards
            .par_iter()
            .map(|shard| classify_shard(shard, &config.classify))
            .collect::<Vec<_>>()
    });

    eprintln!("merging results...");
    let agg = merge_reports(reports);
    let table = probability_table(&agg);
    print_results(&agg, &table);

    update_probability_file(&config.prob_file, &table)?;
    write_run_file(&config.knot_id_file, &agg.runs)?;

    let elapsed = started.elapsed();
    println!(
        "\nJm-triviality distribution saved to {}",
        config.prob_file.display()
    );
    println!("Knot runs written to {}", config.knot_id_file.display());
    println!("Elapsed time {}", format_elapsed(elapsed));

    Ok(RunSummary {
        shards: split.shards.len(),
        failed_shards: agg.failed_shards,
        fallback_boundaries: split.fallback_boundaries,
        processed: agg.processed,
        skipped: agg.skipped,
        buckets: agg.stats.len(),
        elapsed,
    })
}

fn print_results(agg: &Aggregate, table: &BTreeMap<String, Vec<f64>>) {
    println!("\n{}", "=".repeat(60));
    println!("RESULTS");
    println!("{}", "=".repeat(60));
    for (bucket, stats) in &agg.stats {
        let total = stats.total();
        if total == 0 {
            continue;
        }
        if stats.max_label.is_empty() {
            println!("\n{} crossings.", bucket);
        } else {
            println!(
                "\n{} crossings. Maximally trivial m={}; knot {}",
                bucket, stats.max_m, stats.max_label
            );
        }
        if let Some(probs) = table.get(bucket) {
            let line = probs
                .iter()
                .enumerate()
                .map(|(i, p)| format!("J{}: {:.2}", i + 2, p))
                .collect::<Vec<_>>()
                .join(" | ");
            println!("{} knots. Jm-trivial probabilities: {}", total, line);
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
