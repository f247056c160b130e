//! # Streaming shard classifier
//!
//! One worker consumes one shard file through a streaming key/value parser —
//! a `DeserializeSeed` visitor over `serde_json::Deserializer`, the record
//! map visited entry by entry — so memory stays constant beyond the single
//! record being classified. Every record-level fault (empty or malformed
//! coefficient map, unparseable label, an engine error) skips that record and
//! never aborts the shard; a mid-stream parse or I/O fault degrades the
//! worker to a partial report carrying everything accumulated so far.
//!
//! All accumulation happens in an explicit per-worker object returned by
//! value; configuration travels in [`ClassifyConfig`]. No process-global
//! state.

use crate::expansion::{classify, Representation};
use crate::label::parse_label;
use crate::poly::Laurent;
use crate::split::ShardDescriptor;
use anyhow::{Context, Result};
use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reserved label for the unknot record; never classified.
const UNKNOT_LABEL: &str = "0_1";

/// Per-worker classification parameters, passed by value into each worker.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Which algebra engine computes Jm
    pub representation: Representation,
    /// Maximum id gap an open run absorbs by jumping its upper bound
    pub sample_interval: u64,
    /// Runs are recorded only for Jm values above this threshold
    pub min_m: u32,
    /// Taylor truncation order for the Birman-Lin engine
    pub order: usize,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        ClassifyConfig {
            representation: Representation::Jvp,
            sample_interval: 1,
            min_m: 1,
            order: 11,
        }
    }
}

/// A compressed interval of consecutive knot identifiers within one crossing
/// bucket that all classify to the same Jm value.
///
/// `last_id` only ever grows while the run is open; a run is sealed the
/// moment a discontinuity starts a new one, and sealed runs are never
/// reopened. Serialized as the `[bucket, first_id, last_id, label]` tuple the
/// downstream visualizer consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub bucket: String,
    pub first_id: u64,
    pub last_id: u64,
    /// One representative label for the interval
    pub label: String,
}

impl serde::Serialize for Run {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeTuple;
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.bucket)?;
        tuple.serialize_element(&self.first_id)?;
        tuple.serialize_element(&self.last_id)?;
        tuple.serialize_element(&self.label)?;
        tuple.end()
    }
}

/// Jm histogram and maximal holder for one crossing-number bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossingStats {
    /// Jm value → occurrence count
    pub histogram: BTreeMap<u32, u64>,
    /// Largest Jm seen; baseline 2 until a record exceeds it
    pub max_m: u32,
    /// Label of the maximal-Jm record, empty until one exceeds the baseline
    pub max_label: String,
}

impl Default for CrossingStats {
    fn default() -> Self {
        CrossingStats {
            histogram: BTreeMap::new(),
            max_m: 2,
            max_label: String::new(),
        }
    }
}

impl CrossingStats {
    pub fn total(&self) -> u64 {
        self.histogram.values().sum()
    }

    /// Additive merge: counts summed, the maximal holder replaced only on a
    /// strictly greater Jm (ties keep the incumbent).
    pub fn merge_from(&mut self, other: &CrossingStats) {
        for (&m, &count) in &other.histogram {
            *self.histogram.entry(m).or_insert(0) += count;
        }
        if other.max_m > self.max_m {
            self.max_m = other.max_m;
            self.max_label = other.max_label.clone();
        }
    }
}

/// Everything one worker accumulated from its shard.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Crossing bucket → histogram and maximal holder
    pub stats: BTreeMap<String, CrossingStats>,
    /// Jm value → representative runs, in stream order
    pub runs: BTreeMap<u32, Vec<Run>>,
    /// Records seen, including skipped ones
    pub processed: u64,
    /// Records skipped (malformed, unparseable, or engine errors)
    pub skipped: u64,
    /// Set when the stream faulted mid-shard; the rest is partial but valid
    pub error: Option<String>,
}

struct Accumulator {
    config: ClassifyConfig,
    report: WorkerReport,
}

impl Accumulator {
    fn new(worker_id: usize, config: ClassifyConfig) -> Self {
        Accumulator {
            config,
            report: WorkerReport {
                worker_id,
                ..WorkerReport::default()
            },
        }
    }

    fn observe(&mut self, label: String, coeffs: BTreeMap<String, Value>) {
        self.report.processed += 1;
        if self.report.processed % 10_000 == 0 {
            eprint!(
                "\rworker {}: {} knots",
                self.report.worker_id, self.report.processed
            );
        }
        if label == UNKNOT_LABEL {
            return;
        }
        if coeffs.is_empty() {
            self.report.skipped += 1;
            return;
        }
        let mut int_coeffs = BTreeMap::new();
        for (exp, value) in &coeffs {
            match value.as_i64() {
                Some(c) => {
                    int_coeffs.insert(exp.clone(), c);
                }
                None => {
                    self.report.skipped += 1;
                    return;
                }
            }
        }
        let poly = match Laurent::from_string_map(&int_coeffs) {
            Ok(poly) if !poly.is_empty() => poly,
            _ => {
                self.report.skipped += 1;
                return;
            }
        };
        let parsed = match parse_label(&label) {
            Some(parsed) => parsed,
            None => {
                self.report.skipped += 1;
                return;
            }
        };
        let m = match classify(&poly, self.config.representation, self.config.order) {
            Ok(m) => m,
            Err(_) => {
                self.report.skipped += 1;
                return;
            }
        };

        let stats = self.report.stats.entry(parsed.crossings.clone()).or_default();
        *stats.histogram.entry(m).or_insert(0) += 1;
        if m > stats.max_m {
            eprintln!(
                "\nworker {}: knot {}: J{}-trivial",
                self.report.worker_id, label, m
            );
            stats.max_m = m;
            stats.max_label = label.clone();
        }
        if m > self.config.min_m {
            self.observe_run(m, parsed.crossings, parsed.id, label);
        }
    }

    fn observe_run(&mut self, m: u32, bucket: String, id: u64, label: String) {
        let runs = self.report.runs.entry(m).or_default();
        match runs.last_mut() {
            Some(run)
                if run.bucket == bucket
                    && id <= run.last_id.saturating_add(self.config.sample_interval) =>
            {
                // Jump-extend the upper bound within the sample interval; an
                // id at or below it leaves the run unchanged (monotone).
                if id > run.last_id {
                    run.last_id = id;
                }
            }
            _ => runs.push(Run {
                bucket,
                first_id: id,
                last_id: id,
                label,
            }),
        }
    }
}

#[derive(Deserialize)]
struct RecordBody {
    #[serde(default)]
    coeffs: BTreeMap<String, Value>,
}

struct ShardSeed<'a, F> {
    sink: &'a mut F,
}

impl<'de, F> DeserializeSeed<'de> for ShardSeed<'_, F>
where
    F: FnMut(String, BTreeMap<String, Value>),
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for ShardSeed<'_, F>
where
    F: FnMut(String, BTreeMap<String, Value>),
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a shard object with a \"data\" map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            if key == "data" {
                map.next_value_seed(DataSeed {
                    sink: &mut *self.sink,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

struct DataSeed<'a, F> {
    sink: &'a mut F,
}

impl<'de, F> DeserializeSeed<'de> for DataSeed<'_, F>
where
    F: FnMut(String, BTreeMap<String, Value>),
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for DataSeed<'_, F>
where
    F: FnMut(String, BTreeMap<String, Value>),
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map of knot records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        // One record body resident at a time.
        while let Some(label) = map.next_key::<String>()? {
            let body: RecordBody = map.next_value()?;
            (self.sink)(label, body.coeffs);
        }
        Ok(())
    }
}

/// Stream every (label, coeffs) record of a shard file into `sink`.
fn stream_records<F>(path: &Path, sink: &mut F) -> Result<()>
where
    F: FnMut(String, BTreeMap<String, Value>),
{
    let file =
        File::open(path).with_context(|| format!("cannot open shard {}", path.display()))?;
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
    ShardSeed { sink }
        .deserialize(&mut deserializer)
        .with_context(|| format!("streaming records from {}", path.display()))?;
    Ok(())
}

/// Classify every record of one shard. Never fails: a shard-level fault is
/// recorded in the report and the sibling workers are unaffected.
pub fn classify_shard(shard: &ShardDescriptor, config: &ClassifyConfig) -> WorkerReport {
    let mut acc = Accumulator::new(shard.index, config.clone());
    eprintln!("worker {}: starting {}", shard.index, shard.path.display());
    let outcome = stream_records(&shard.path, &mut |label, coeffs| acc.observe(label, coeffs));
    if let Err(err) = outcome {
        eprintln!("\nworker {}: error parsing shard: {:#}", shard.index, err);
        eprintln!(
            "worker {}: processed {} knots before the error",
            shard.index, acc.report.processed
        );
        acc.report.error = Some(format!("{:#}", err));
    }
    eprintln!(
        "\nworker {}: done - {} knots processed",
        shard.index, acc.report.processed
    );
    acc.report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TREFOIL: &str = r#"{"coeffs": {"4": -1, "3": 1, "1": 1}}"#;

    fn shard_at(dir: &Path, body: &str) -> ShardDescriptor {
        let path = dir.join("shard.json");
        fs::write(&path, body).unwrap();
        ShardDescriptor {
            index: 0,
            start: 0,
            end: body.len() as u64,
            path,
        }
    }

    fn record(label: &str) -> String {
        format!("\"{}\": {}", label, TREFOIL)
    }

    #[test]
    fn classifies_and_buckets_records() {
        let dir = tempdir().unwrap();
        let body = format!(
            r#"{{"data":{{"0_1": {{"coeffs": {{"0": 1}}}}, {}, "4a_1": {{"coeffs": {{"-2": 1, "-1": -1, "0": 1, "1": -1, "2": 1}}}}}}}}"#,
            record("3a_1")
        );
        let shard = shard_at(dir.path(), &body);
        let report = classify_shard(&shard, &ClassifyConfig::default());

        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped, 0);
        assert!(report.error.is_none());
        let three = &report.stats["3"];
        assert_eq!(three.histogram[&3], 1);
        assert_eq!(three.max_m, 3);
        assert_eq!(three.max_label, "3a_1");
        assert_eq!(report.stats["4"].histogram[&3], 1);
    }

    #[test]
    fn record_level_faults_skip_not_abort() {
        let dir = tempdir().unwrap();
        let body = format!(
            r#"{{"data":{{"5a_1": {{"coeffs": {{}}}}, "5a_2": {{"coeffs": {{"1": "x"}}}}, "notalabel_z": {}, {}}}}}"#,
            TREFOIL,
            record("5a_4")
        );
        let shard = shard_at(dir.path(), &body);
        let report = classify_shard(&shard, &ClassifyConfig::default());

        assert_eq!(report.processed, 4);
        assert_eq!(report.skipped, 3);
        assert!(report.error.is_none());
        assert_eq!(report.stats["5"].histogram[&3], 1);
    }

    #[test]
    fn contiguous_ids_extend_one_run() {
        let dir = tempdir().unwrap();
        let body = format!(
            r#"{{"data":{{{}, {}, {}, {}, {}}}}}"#,
            record("5a_1"),
            record("5a_2"),
            record("5a_3"),
            record("5a_10"),
            record("6a_11"),
        );
        let shard = shard_at(dir.path(), &body);
        let report = classify_shard(&shard, &ClassifyConfig::default());

        let runs = &report.runs[&3];
        assert_eq!(
            runs,
            &vec![
                Run {
                    bucket: "5".into(),
                    first_id: 1,
                    last_id: 3,
                    label: "5a_1".into()
                },
                Run {
                    bucket: "5".into(),
                    first_id: 10,
                    last_id: 10,
                    label: "5a_10".into()
                },
                Run {
                    bucket: "6".into(),
                    first_id: 11,
                    last_id: 11,
                    label: "6a_11".into()
                },
            ]
        );
    }

    #[test]
    fn sample_interval_extends_by_jumping() {
        let dir = tempdir().unwrap();
        let body = format!(
            r#"{{"data":{{{}, {}, {}}}}}"#,
            record("5a_1"),
            record("5a_8"),
            record("5a_5"),
        );
        let shard = shard_at(dir.path(), &body);
        let config = ClassifyConfig {
            sample_interval: 10,
            ..ClassifyConfig::default()
        };
        let report = classify_shard(&shard, &config);

        // 8 jump-extends the upper bound; the out-of-order 5 is a no-op.
        let runs = &report.runs[&3];
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].first_id, 1);
        assert_eq!(runs[0].last_id, 8);
    }

    #[test]
    fn stream_fault_degrades_to_partial_report() {
        let dir = tempdir().unwrap();
        let body = format!(r#"{{"data":{{{}, "5a_2": {{"coe"#, record("5a_1"));
        let shard = shard_at(dir.path(), &body);
        let report = classify_shard(&shard, &ClassifyConfig::default());

        assert!(report.error.is_some());
        assert_eq!(report.processed, 1);
        assert_eq!(report.stats["5"].histogram[&3], 1);
    }

    #[test]
    fn run_serializes_as_visualizer_tuple() {
        let run = Run {
            bucket: "14".into(),
            first_id: 7,
            last_id: 9,
            label: "14a_7".into(),
        };
        assert_eq!(
            serde_json::to_value(&run).unwrap(),
            serde_json::json!(["14", 7, 9, "14a_7"])
        );
    }

    #[test]
    fn min_m_threshold_gates_runs() {
        let dir = tempdir().unwrap();
        let body = format!(r#"{{"data":{{{}}}}}"#, record("5a_1"));
        let shard = shard_at(dir.path(), &body);
        let config = ClassifyConfig {
            min_m: 5,
            ..ClassifyConfig::default()
        };
        let report = classify_shard(&shard, &config);
        assert!(report.runs.is_empty());
        assert_eq!(report.stats["5"].histogram[&3], 1);
    }
}
