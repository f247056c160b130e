use anyhow::{anyhow, Result};
use clap::Parser;
use jmscan::classify::ClassifyConfig;
use jmscan::expansion::Representation;
use jmscan::pipeline::{run, RunConfig};
use std::path::PathBuf;
use std::thread;

/// Split-and-stream Jm-triviality classification of massive Jones
/// coefficient corpora.
///
/// Computes the Jm-triviality index from a finite-type expansion of each
/// knot's Jones polynomial, updates the per-crossing probability
/// distribution, and writes knot-id runs for the visualizer.
#[derive(Parser)]
#[command(name = "jmscan", version)]
struct Cli {
    /// Corpus file: one JSON object with "meta" and "data" keys
    corpus: PathBuf,

    /// Worker (and shard) count; defaults to available parallelism
    workers: Option<usize>,

    /// Expansion engine: "jvp" (ring substitution) or "bl" (Birman-Lin)
    #[arg(long, default_value = "jvp")]
    rep: String,

    /// Extend a run across id gaps up to this interval
    #[arg(long, default_value_t = 1)]
    sample_interval: u64,

    /// Taylor truncation order for the Birman-Lin engine
    #[arg(long, default_value_t = 11)]
    order: usize,

    /// Probability table output, updated in place
    #[arg(long, default_value = "Jm_probs.json")]
    prob_file: PathBuf,

    /// Knot-id run table output, overwritten each run
    #[arg(long, default_value = "knot_ids.json")]
    knot_id_file: PathBuf,

    /// Directory receiving the shard files
    #[arg(long, default_value = "knot_splits")]
    splits_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let representation = Representation::from_str(&cli.rep)
        .ok_or_else(|| anyhow!("unknown representation {:?} (expected jvp or bl)", cli.rep))?;
    let workers = cli.workers.unwrap_or_else(|| {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    });

    println!("Using {} workers.", workers);
    println!(">> Using {} representation <<", representation.as_str());

    let config = RunConfig {
        corpus: cli.corpus,
        workers,
        classify: ClassifyConfig {
            representation,
            sample_interval: cli.sample_interval,
            order: cli.order,
            ..ClassifyConfig::default()
        },
        splits_dir: cli.splits_dir,
        prob_file: cli.prob_file,
        knot_id_file: cli.knot_id_file,
    };
    let summary = run(&config)?;
    if summary.failed_shards > 0 {
        eprintln!(
            "warning: {} of {} shards faulted; results are best-effort partials",
            summary.failed_shards, summary.shards
        );
    }
    if summary.fallback_boundaries > 0 {
        eprintln!(
            "warning: {} shard boundaries fell back to raw byte offsets",
            summary.fallback_boundaries
        );
    }
    Ok(())
}
